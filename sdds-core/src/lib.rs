#![no_std]

//! SDDS Core - Self-Describing Data Set format definitions
//!
//! This crate provides the primitive type system, layout model, header codec,
//! name resolver and error taxonomy for SDDS files. It performs no I/O; the
//! page codec and reader/writer handles live in the `sdds` crate.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod channel;
pub mod error;
pub mod format;
pub mod layout;
pub mod mask;
pub mod select;
pub mod traits;
pub mod validation;
pub mod value;

pub use channel::{ErrorFrame, ErrorStack, PrintMode};
pub use error::*;
pub use format::*;
pub use layout::{AssociateDef, FieldDef, FieldKind, Layout};
pub use mask::RowMask;
pub use select::{Logic, Matcher, Selection, Step, TypeFilter};
pub use traits::{CharCode, Element, NumericElement};
pub use value::{ArrayData, ColumnData, Value};
