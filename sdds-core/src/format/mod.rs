//! Text format definitions for SDDS headers
//!
//! This module contains the data type table, `&data` settings, the namelist
//! tokenizer and the header parser/emitter. Pure text in and out, no I/O.

pub mod constants;
pub mod data_mode;
pub mod data_type;
pub mod header;
pub mod namelist;
pub mod printf;

pub use data_mode::{DataMode, Encoding, Endianness, MajorOrder};
pub use data_type::DataType;
pub use header::{write_header, HeaderParser, HeaderProgress};
pub use printf::PrintfFormat;
