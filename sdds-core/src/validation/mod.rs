//! Validation utilities for SDDS definitions
//!
//! This module contains pure validation functions with no I/O dependencies.

pub mod bounds;
pub mod format;
pub mod parsing;

pub use bounds::{checked_element_count, validate_string_length};
pub use format::validate_format_string;
pub use parsing::{is_valid_name, validate_name};
