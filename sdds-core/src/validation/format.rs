//! Format-string validation for field definitions

use crate::error::{Result, SddsError};
use crate::format::{DataType, PrintfFormat};

/// Validate that `format` parses and suits fields of `data_type`
///
/// Numeric conversions are rejected for strings and `%s` for numbers;
/// characters accept either.
pub fn validate_format_string(format: &str, data_type: DataType) -> Result<PrintfFormat> {
    let parsed = PrintfFormat::parse(format)?;
    let compatible = match data_type {
        DataType::String => !parsed.is_numeric(),
        DataType::Char => true,
        _ => parsed.is_numeric(),
    };
    if !compatible {
        return Err(SddsError::InvalidFormat {
            format: format.into(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        assert!(validate_format_string("%10.3f", DataType::F64).is_ok());
        assert!(validate_format_string("%d", DataType::I32).is_ok());
        assert!(validate_format_string("%s", DataType::String).is_ok());
        assert!(validate_format_string("%c", DataType::Char).is_ok());
        assert!(validate_format_string("%s", DataType::F64).is_err());
        assert!(validate_format_string("%e", DataType::String).is_err());
    }
}
