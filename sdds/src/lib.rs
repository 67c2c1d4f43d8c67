//! SDDS - Self-Describing Data Set reader and writer
//!
//! A dataset is a text header declaring parameters, arrays and columns,
//! followed by any number of pages. Pages are encoded as whitespace-separated
//! text or as packed binary in either byte order, row- or column-major.
//!
//! ## Architecture
//!
//! - **sdds-core**: type system, layout model, header codec, name resolver
//!   and error taxonomy (no I/O)
//! - **sdds**: page codecs, byte sources and the reader/writer handles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdds::{DataType, ReaderOptions, SddsReader, SddsWriter, WriterOptions};
//!
//! fn example() -> sdds::Result<()> {
//!     let mut writer = SddsWriter::create("beam.sdds", WriterOptions::binary())?;
//!     writer.define_parameter("Step", DataType::I32)?;
//!     writer.define_column("x", DataType::F64)?;
//!     writer.start_page(None)?;
//!     writer.set_parameter("Step", 1)?;
//!     writer.set_column("x", vec![0.1, 0.2, 0.3])?;
//!     writer.write_page()?;
//!     writer.into_inner()?;
//!
//!     let mut reader = SddsReader::open("beam.sdds", ReaderOptions::default())?;
//!     while let Some(page) = reader.read_page()? {
//!         let x = reader.column::<f64>("x")?;
//!         println!("page {page}: {} rows", x.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **mmap**: memory-mapped input for regular files
//! - **serde**: serializable layouts, values and error frames
//! - **cli**: the `sddsconvert` and `sddsquery` tools

pub use sdds_core::*;

pub mod channel;
mod codec;
pub mod options;
pub mod page;
pub mod reader;
pub mod source;
pub mod writer;

#[cfg(feature = "cli")]
pub mod cli;

pub use channel::{print_errors, program_name, register_program_name, PrintErrors};
pub use options::{ReaderOptions, TerminateMode, WriterOptions};
pub use page::Page;
pub use reader::{ReaderState, SddsReader};
pub use source::Source;
pub use writer::{CopyDefinitions, SddsWriter, WriterState};
