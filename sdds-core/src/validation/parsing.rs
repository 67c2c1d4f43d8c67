//! Name validation for field definitions
//!
//! Names must start with a letter, `.` or `:` and continue with letters,
//! digits or one of ``@:#+%-._$&/[]``.

use crate::error::{Result, SddsError};
use crate::layout::FieldKind;

const EXTRA_FIRST: &[u8] = b".:";
const EXTRA_REST: &[u8] = b"@:#+%-._$&/[]";

/// Check a name against the naming rules
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some((&first, rest)) = bytes.split_first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || EXTRA_FIRST.contains(&first)) {
        return false;
    }
    rest.iter()
        .all(|b| b.is_ascii_alphanumeric() || EXTRA_REST.contains(b))
}

/// Validate a name for a field of `kind`
pub fn validate_name(kind: FieldKind, name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SddsError::InvalidName {
            kind,
            name: name.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("x"));
        assert!(is_valid_name("Beam.Energy"));
        assert!(is_valid_name(":PV:setpoint"));
        assert!(is_valid_name("s[1]/c$x&y@z#w+v%u-t_"));
    }

    #[test]
    fn test_invalid_names() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("_x"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("comma,name"));
        assert!(!is_valid_name("quote\"d"));
        assert!(matches!(
            validate_name(FieldKind::Column, "a=b"),
            Err(SddsError::InvalidName { kind: FieldKind::Column, .. })
        ));
    }
}
