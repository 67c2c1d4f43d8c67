//! Reader and writer configuration

use sdds_core::constants::MAX_STRING_LENGTH;
use sdds_core::{DataMode, Encoding, Endianness, MajorOrder, PrintMode};

/// What `terminate` does with the last page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminateMode {
    /// Drop every buffer
    #[default]
    Release,
    /// Hand the current page to the caller so its strings outlive the handle
    RetainPage,
}

/// Configuration for [`SddsReader`](crate::SddsReader)
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Map regular files into memory instead of buffered reads
    pub use_mmap: bool,
    /// Largest binary string length prefix accepted
    pub max_string_length: u64,
    /// Drop warnings instead of recording them
    pub no_warnings: bool,
    /// Keep the complete rows of a truncated final page
    pub auto_recover: bool,
    /// Accept field names outside the usual character set
    pub allow_any_name: bool,
    /// Default rendering for [`print_errors`](crate::channel::print_errors)
    pub print_mode: PrintMode,
}

impl ReaderOptions {
    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_max_string_length(mut self, max_string_length: u64) -> Self {
        self.max_string_length = max_string_length;
        self
    }

    pub fn with_no_warnings(mut self, no_warnings: bool) -> Self {
        self.no_warnings = no_warnings;
        self
    }

    pub fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    pub fn with_any_name(mut self, allow_any_name: bool) -> Self {
        self.allow_any_name = allow_any_name;
        self
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            use_mmap: cfg!(feature = "mmap"),
            max_string_length: MAX_STRING_LENGTH,
            no_warnings: false,
            auto_recover: false,
            allow_any_name: false,
            print_mode: PrintMode::Verbose,
        }
    }
}

/// Configuration for [`SddsWriter`](crate::SddsWriter)
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Encoding and major order of the page bodies
    pub data_mode: DataMode,
    /// Byte order for binary pages, host order when `None`
    pub endianness: Option<Endianness>,
    /// Drop warnings instead of recording them
    pub no_warnings: bool,
    pub description: Option<String>,
    pub contents: Option<String>,
}

impl WriterOptions {
    pub fn ascii() -> Self {
        Self::default()
    }

    pub fn binary() -> Self {
        Self {
            data_mode: DataMode::binary(),
            ..Self::default()
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.data_mode.encoding = encoding;
        self
    }

    pub fn with_major_order(mut self, major_order: MajorOrder) -> Self {
        self.data_mode.major_order = major_order;
        self
    }

    /// Emit binary pages in `endianness` instead of host order
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    /// Text pages end at a blank line instead of carrying a row count
    pub fn with_no_row_counts(mut self, no_row_counts: bool) -> Self {
        self.data_mode.no_row_counts = no_row_counts;
        self
    }

    pub fn with_no_warnings(mut self, no_warnings: bool) -> Self {
        self.no_warnings = no_warnings;
        self
    }

    pub fn with_description(mut self, description: &str, contents: &str) -> Self {
        self.description = Some(description.into());
        self.contents = Some(contents.into());
        self
    }

    /// The data mode the header will declare
    pub fn resolved_data_mode(&self) -> DataMode {
        let mut mode = self.data_mode;
        mode.endianness = self.endianness.unwrap_or(Endianness::NATIVE);
        if mode.is_binary() {
            mode.no_row_counts = false;
        }
        mode.additional_header_lines = 0;
        mode
    }
}
