//! Primitive element kinds supported by SDDS files

use core::str::FromStr;

use crate::error::{Result, SddsError};

/// Element kinds supported in SDDS files
///
/// Discriminants follow the original type codes where one exists; the 8-bit
/// integer kinds extend the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DataType {
    /// 64-bit floating point (`double`)
    F64 = 2,
    /// 32-bit floating point (`float`)
    F32 = 3,
    /// 64-bit signed integer (`long64`)
    I64 = 4,
    /// 64-bit unsigned integer (`ulong64`)
    U64 = 5,
    /// 32-bit signed integer (`long`)
    I32 = 6,
    /// 32-bit unsigned integer (`ulong`)
    U32 = 7,
    /// 16-bit signed integer (`short`)
    I16 = 8,
    /// 16-bit unsigned integer (`ushort`)
    U16 = 9,
    /// Variable length string
    String = 10,
    /// Single 8-bit character
    Char = 11,
    /// 8-bit signed integer
    I8 = 12,
    /// 8-bit unsigned integer
    U8 = 13,
}

impl DataType {
    /// Every kind, in discriminant order
    pub const ALL: [DataType; 12] = [
        DataType::F64,
        DataType::F32,
        DataType::I64,
        DataType::U64,
        DataType::I32,
        DataType::U32,
        DataType::I16,
        DataType::U16,
        DataType::String,
        DataType::Char,
        DataType::I8,
        DataType::U8,
    ];

    /// Convert from u8 representation
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(DataType::F64),
            3 => Some(DataType::F32),
            4 => Some(DataType::I64),
            5 => Some(DataType::U64),
            6 => Some(DataType::I32),
            7 => Some(DataType::U32),
            8 => Some(DataType::I16),
            9 => Some(DataType::U16),
            10 => Some(DataType::String),
            11 => Some(DataType::Char),
            12 => Some(DataType::I8),
            13 => Some(DataType::U8),
            _ => None,
        }
    }

    /// Convert to u8 representation
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the size in bytes for this data type, 0 for strings
    pub const fn size_bytes(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 | DataType::Char => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
            DataType::String => 0,
        }
    }

    /// Name used for this kind in `type=` header attributes
    pub const fn header_name(self) -> &'static str {
        match self {
            DataType::F64 => "double",
            DataType::F32 => "float",
            DataType::I64 => "long64",
            DataType::U64 => "ulong64",
            DataType::I32 => "long",
            DataType::U32 => "ulong",
            DataType::I16 => "short",
            DataType::U16 => "ushort",
            DataType::String => "string",
            DataType::Char => "character",
            DataType::I8 => "int8",
            DataType::U8 => "uint8",
        }
    }

    pub const fn is_string(self) -> bool {
        matches!(self, DataType::String)
    }

    /// Integer and floating kinds; characters and strings are not numeric
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::I8
                | DataType::I16
                | DataType::I32
                | DataType::I64
                | DataType::U8
                | DataType::U16
                | DataType::U32
                | DataType::U64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl TryFrom<u8> for DataType {
    type Error = SddsError;

    fn try_from(value: u8) -> Result<Self> {
        DataType::from_u8(value).ok_or(SddsError::UnknownType(value))
    }
}

impl FromStr for DataType {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        let data_type = match s.trim() {
            "double" | "f64" => DataType::F64,
            "float" | "f32" => DataType::F32,
            "long64" | "int64" | "i64" => DataType::I64,
            "ulong64" | "uint64" | "u64" => DataType::U64,
            "long" | "int32" | "i32" => DataType::I32,
            "ulong" | "uint32" | "u32" => DataType::U32,
            "short" | "int16" | "i16" => DataType::I16,
            "ushort" | "uint16" | "u16" => DataType::U16,
            "string" => DataType::String,
            "character" | "char" => DataType::Char,
            "int8" | "i8" => DataType::I8,
            "uint8" | "u8" => DataType::U8,
            other => return Err(SddsError::InvalidType(other.into())),
        };
        Ok(data_type)
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.header_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminant_round_trip() {
        for data_type in DataType::ALL {
            assert_eq!(DataType::from_u8(data_type.to_u8()), Some(data_type));
            assert_eq!(data_type.header_name().parse::<DataType>().ok(), Some(data_type));
        }
        assert!(matches!(DataType::try_from(0), Err(SddsError::UnknownType(0))));
        assert!(matches!(DataType::try_from(1), Err(SddsError::UnknownType(1))));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::Char.size_bytes(), 1);
        assert_eq!(DataType::U16.size_bytes(), 2);
        assert_eq!(DataType::F32.size_bytes(), 4);
        assert_eq!(DataType::I64.size_bytes(), 8);
        assert_eq!(DataType::String.size_bytes(), 0);
    }

    #[test]
    fn test_classes() {
        assert!(DataType::U8.is_integer());
        assert!(!DataType::Char.is_numeric());
        assert!(DataType::F32.is_float());
        assert!(!DataType::String.is_numeric());
        assert!("longdouble".parse::<DataType>().is_err());
    }
}
