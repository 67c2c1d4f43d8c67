//! Element traits for typed access to SDDS values
//!
//! Column buffers are stored as a closed enum of typed vectors; these traits
//! map a Rust element type onto its variant.

pub mod element;

pub use element::{CharCode, Element, NumericElement};
