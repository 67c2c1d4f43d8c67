//! `&data` directive settings: encoding, major order and byte order

use core::str::FromStr;

use crate::error::{Result, SddsError};

/// Page body encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    /// Whitespace separated tokens, one value per line for parameters
    #[default]
    Ascii,
    /// Fixed-width native values with length-prefixed strings
    Binary,
}

impl Encoding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Binary => "binary",
        }
    }
}

impl FromStr for Encoding {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ascii" | "text" => Ok(Encoding::Ascii),
            "binary" => Ok(Encoding::Binary),
            other => Err(SddsError::MalformedHeader {
                line: 0,
                reason: alloc::format!("unknown data mode {other:?}"),
            }),
        }
    }
}

/// Orientation of the tabular region on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MajorOrder {
    #[default]
    Row,
    Column,
}

impl MajorOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            MajorOrder::Row => "row",
            MajorOrder::Column => "column",
        }
    }
}

impl FromStr for MajorOrder {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "row" => Ok(MajorOrder::Row),
            "column" => Ok(MajorOrder::Column),
            other => Err(SddsError::MalformedHeader {
                line: 0,
                reason: alloc::format!("unknown major order {other:?}"),
            }),
        }
    }
}

/// Byte order of multi-byte values in binary pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the host
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endianness = Endianness::Little;
    /// Byte order of the host
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endianness = Endianness::Big;

    pub const fn is_native(self) -> bool {
        matches!(
            (self, Self::NATIVE),
            (Endianness::Little, Endianness::Little) | (Endianness::Big, Endianness::Big)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::NATIVE
    }
}

impl FromStr for Endianness {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "little" | "little-endian" => Ok(Endianness::Little),
            "big" | "big-endian" => Ok(Endianness::Big),
            other => Err(SddsError::MalformedHeader {
                line: 0,
                reason: alloc::format!("unknown byte order {other:?}"),
            }),
        }
    }
}

/// Settings carried by the `&data` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataMode {
    pub encoding: Encoding,
    pub major_order: MajorOrder,
    /// Byte order of binary pages; ignored for ascii
    pub endianness: Endianness,
    /// Text pages omit the row count and end at a blank line
    pub no_row_counts: bool,
    /// Text lines to skip after the `&data` directive
    pub additional_header_lines: u32,
}

impl DataMode {
    pub fn ascii() -> Self {
        Self::default()
    }

    pub fn binary() -> Self {
        Self {
            encoding: Encoding::Binary,
            ..Self::default()
        }
    }

    pub fn with_major_order(mut self, major_order: MajorOrder) -> Self {
        self.major_order = major_order;
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_no_row_counts(mut self, no_row_counts: bool) -> Self {
        self.no_row_counts = no_row_counts;
        self
    }

    pub fn is_binary(&self) -> bool {
        self.encoding == Encoding::Binary
    }

    /// Check whether values read under this mode need a byte swap
    pub fn needs_swap(&self) -> bool {
        self.is_binary() && !self.endianness.is_native()
    }
}
