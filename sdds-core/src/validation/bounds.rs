//! Size and length bounds for page contents
//!
//! Pure arithmetic checks with overflow protection, no I/O.

use crate::error::{Result, SddsError};

/// Product of array dimensions, `None` on overflow
///
/// An empty dimension list describes zero elements.
pub fn checked_element_count(dims: &[u32]) -> Option<usize> {
    if dims.is_empty() {
        return Some(0);
    }
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
}

/// Validate a binary string length prefix against `limit`
pub fn validate_string_length(length: u64, limit: u64) -> Result<usize> {
    if length > limit || length > usize::MAX as u64 {
        return Err(SddsError::StringTooLong { length, limit });
    }
    Ok(length as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count() {
        assert_eq!(checked_element_count(&[3, 4]), Some(12));
        assert_eq!(checked_element_count(&[5, 0]), Some(0));
        assert_eq!(checked_element_count(&[]), Some(0));
        assert_eq!(checked_element_count(&[u32::MAX, u32::MAX, u32::MAX]), None);
    }

    #[test]
    fn test_string_length() {
        assert!(matches!(validate_string_length(10, 100), Ok(10)));
        assert!(matches!(
            validate_string_length(101, 100),
            Err(SddsError::StringTooLong { length: 101, limit: 100 })
        ));
    }
}
