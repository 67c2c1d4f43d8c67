//! Format constants and magic bytes for SDDS files

/// Magic prefix of the first header line
pub const MAGIC: &str = "SDDS";

/// Protocol version emitted by writers
pub const VERSION: u32 = 5;

/// Oldest protocol version readers accept
pub const MIN_VERSION: u32 = 1;

/// Default upper bound on a binary string length prefix
pub const MAX_STRING_LENGTH: u64 = i32::MAX as u64;

/// Header comment declaring the byte order of binary pages
pub const ENDIAN_COMMENT_PREFIX: &str = "!#";
