//! Error types for SDDS operations

use alloc::string::String;

use crate::format::DataType;
use crate::layout::FieldKind;

/// How an error affects the handle that raised it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Diagnostic only; the operation succeeded
    Warning,
    /// The operation failed but the handle stays usable
    Recoverable,
    /// The handle is drained and must be terminated
    Fatal,
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Recoverable => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Errors that can occur during SDDS operations
#[derive(Debug, thiserror::Error)]
pub enum SddsError {
    /// The stream does not start with the SDDS magic line
    #[error("not an SDDS file (first line {found:?})")]
    NotAFormatFile { found: String },

    /// Unrecognized `&tag` directive
    #[error("unknown directive &{name}")]
    UnknownDirective { name: String, in_header: bool },

    /// Unrecognized `key=value` on a known directive
    #[error("unknown attribute {attribute:?} on &{directive}, ignored")]
    UnknownAttribute { directive: String, attribute: String },

    #[error("{kind} {name:?} already exists")]
    DuplicateName { kind: FieldKind, name: String },

    /// Type name that is not one of the supported kinds
    #[error("invalid type {0:?}")]
    InvalidType(String),

    /// Type discriminant outside the closed set
    #[error("unknown type discriminant {0}")]
    UnknownType(u8),

    /// Format string without exactly one usable conversion
    #[error("invalid format string {format:?}")]
    InvalidFormat { format: String },

    #[error("invalid {kind} name {name:?}")]
    InvalidName { kind: FieldKind, name: String },

    #[error("malformed header at line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },

    #[error("malformed page {page}: {reason}")]
    MalformedPage { page: u32, reason: String },

    #[error("unexpected end of data in page {page} while reading {context}")]
    Truncated { page: u32, context: String },

    #[error("unable to scan {data_type} value {token:?} for {field}{}", row_suffix(.row))]
    BadNumericValue {
        field: String,
        row: Option<usize>,
        token: String,
        data_type: DataType,
    },

    #[error("string length {length} exceeds limit {limit}")]
    StringTooLong { length: u64, limit: u64 },

    #[error("{name} has type {actual}, expected {expected}")]
    WrongType {
        name: String,
        expected: String,
        actual: DataType,
    },

    #[error("no {kind} named {name:?}")]
    NameNotFound { kind: FieldKind, name: String },

    #[error("units mismatch for {name}: expected {expected:?}, found {found:?}")]
    UnitsMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("layout already written, definitions are frozen")]
    AlreadyWritten,

    #[error("missing value for parameter {name}")]
    MissingParameter { name: String },

    #[error("dimension mismatch for {name}: {reason}")]
    DimensionMismatch { name: String, reason: String },

    #[error("column {name} has {actual} rows but the page has {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("column {name} was not set for a page with {rows} rows")]
    ColumnNotSet { name: String, rows: usize },

    #[error("{operation} is not allowed while the handle is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Free-form message pushed by a client
    #[error("{message}")]
    Message { severity: Severity, message: String },

    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(row) => alloc::format!(" (row {row})"),
        None => String::new(),
    }
}

/// Discriminant of an [`SddsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    NotAFormatFile,
    UnknownDirective,
    UnknownAttribute,
    DuplicateName,
    InvalidType,
    UnknownType,
    InvalidFormat,
    InvalidName,
    MalformedHeader,
    MalformedPage,
    Truncated,
    BadNumericValue,
    StringTooLong,
    WrongType,
    NameNotFound,
    UnitsMismatch,
    AlreadyWritten,
    MissingParameter,
    DimensionMismatch,
    RowCountMismatch,
    ColumnNotSet,
    InvalidState,
    Message,
    IoError,
}

impl SddsError {
    /// Get the discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SddsError::NotAFormatFile { .. } => ErrorKind::NotAFormatFile,
            SddsError::UnknownDirective { .. } => ErrorKind::UnknownDirective,
            SddsError::UnknownAttribute { .. } => ErrorKind::UnknownAttribute,
            SddsError::DuplicateName { .. } => ErrorKind::DuplicateName,
            SddsError::InvalidType(_) => ErrorKind::InvalidType,
            SddsError::UnknownType(_) => ErrorKind::UnknownType,
            SddsError::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            SddsError::InvalidName { .. } => ErrorKind::InvalidName,
            SddsError::MalformedHeader { .. } => ErrorKind::MalformedHeader,
            SddsError::MalformedPage { .. } => ErrorKind::MalformedPage,
            SddsError::Truncated { .. } => ErrorKind::Truncated,
            SddsError::BadNumericValue { .. } => ErrorKind::BadNumericValue,
            SddsError::StringTooLong { .. } => ErrorKind::StringTooLong,
            SddsError::WrongType { .. } => ErrorKind::WrongType,
            SddsError::NameNotFound { .. } => ErrorKind::NameNotFound,
            SddsError::UnitsMismatch { .. } => ErrorKind::UnitsMismatch,
            SddsError::AlreadyWritten => ErrorKind::AlreadyWritten,
            SddsError::MissingParameter { .. } => ErrorKind::MissingParameter,
            SddsError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            SddsError::RowCountMismatch { .. } => ErrorKind::RowCountMismatch,
            SddsError::ColumnNotSet { .. } => ErrorKind::ColumnNotSet,
            SddsError::InvalidState { .. } => ErrorKind::InvalidState,
            SddsError::Message { .. } => ErrorKind::Message,
            #[cfg(feature = "std")]
            SddsError::Io(_) => ErrorKind::IoError,
        }
    }

    /// Get the severity class of this error
    pub fn severity(&self) -> Severity {
        match self {
            SddsError::UnknownAttribute { .. } | SddsError::UnitsMismatch { .. } => {
                Severity::Warning
            }
            SddsError::UnknownDirective { in_header, .. } => {
                if *in_header {
                    Severity::Fatal
                } else {
                    Severity::Recoverable
                }
            }
            SddsError::WrongType { .. }
            | SddsError::NameNotFound { .. }
            | SddsError::InvalidName { .. }
            | SddsError::InvalidFormat { .. }
            | SddsError::DimensionMismatch { .. }
            | SddsError::RowCountMismatch { .. }
            | SddsError::ColumnNotSet { .. }
            | SddsError::InvalidState { .. } => Severity::Recoverable,
            SddsError::Message { severity, .. } => *severity,
            _ => Severity::Fatal,
        }
    }

    /// Check whether the error leaves the handle unusable
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub(crate) fn bad_value(field: &str, row: Option<usize>, token: &str, data_type: DataType) -> Self {
        SddsError::BadNumericValue {
            field: field.into(),
            row,
            token: token.into(),
            data_type,
        }
    }
}

/// Result type for SDDS operations
pub type Result<T> = core::result::Result<T, SddsError>;
