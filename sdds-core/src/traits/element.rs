//! Element type constraints for SDDS values
//!
//! Every Rust type that can back a column, parameter or array implements
//! [`Element`]. The fixed-width kinds also implement [`NumericElement`], which
//! carries the byte-level and numeric conversions the codecs rely on.

use alloc::string::String;
use alloc::vec::Vec;

use bytemuck::{Pod, Zeroable};

use crate::format::DataType;
use crate::value::{ColumnData, Value};

/// A single 8-bit character, the element type of `character` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct CharCode(pub u8);

impl From<u8> for CharCode {
    fn from(value: u8) -> Self {
        CharCode(value)
    }
}

impl From<CharCode> for char {
    fn from(value: CharCode) -> Self {
        char::from(value.0)
    }
}

/// Trait for types that can be stored in SDDS fields
///
/// Implemented for the ten numeric kinds, [`CharCode`] and [`String`]. The
/// associated functions pick the matching variant out of the dynamically typed
/// containers and return `None` on a kind mismatch.
pub trait Element: Clone + PartialEq + Sized + 'static {
    /// Get the SDDS DataType representation for this element type
    fn data_type() -> DataType;

    fn slice(data: &ColumnData) -> Option<&[Self]>;

    fn vec_mut(data: &mut ColumnData) -> Option<&mut Vec<Self>>;

    fn into_column(values: Vec<Self>) -> ColumnData;

    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

/// Fixed-width element kinds
///
/// These are plain old data: their buffers are reinterpreted as bytes by the
/// binary codec and byte-swapped in place when the file order differs from
/// the host.
pub trait NumericElement: Element + Copy + Pod {
    /// Reverse the byte order of this value
    fn swap(self) -> Self;

    /// Convert from f64 for generic construction
    ///
    /// Float to integer conversion saturates; NaN becomes zero.
    fn from_f64(value: f64) -> Self;

    /// Convert to f64 for generic operations
    fn to_f64(self) -> f64;

    /// Exact integer value, `None` for floating kinds
    fn to_i128(self) -> Option<i128>;

    /// Convert from an exact integer, saturating at the bounds of the kind
    fn from_i128(value: i128) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            fn data_type() -> DataType {
                DataType::$variant
            }

            fn slice(data: &ColumnData) -> Option<&[Self]> {
                match data {
                    ColumnData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn vec_mut(data: &mut ColumnData) -> Option<&mut Vec<Self>> {
                match data {
                    ColumnData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn into_column(values: Vec<Self>) -> ColumnData {
                ColumnData::$variant(values)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

macro_rules! impl_integer {
    ($ty:ty) => {
        impl NumericElement for $ty {
            fn swap(self) -> Self {
                self.swap_bytes()
            }

            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn to_i128(self) -> Option<i128> {
                Some(self as i128)
            }

            fn from_i128(value: i128) -> Self {
                value.clamp(<$ty>::MIN as i128, <$ty>::MAX as i128) as $ty
            }
        }
    };
}

macro_rules! impl_float {
    ($ty:ty) => {
        impl NumericElement for $ty {
            fn swap(self) -> Self {
                <$ty>::from_bits(self.to_bits().swap_bytes())
            }

            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn to_i128(self) -> Option<i128> {
                None
            }

            fn from_i128(value: i128) -> Self {
                value as $ty
            }
        }
    };
}

impl_element!(i8, I8);
impl_element!(i16, I16);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(u32, U32);
impl_element!(u64, U64);
impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(CharCode, Char);
impl_element!(String, String);

impl_integer!(i8);
impl_integer!(i16);
impl_integer!(i32);
impl_integer!(i64);
impl_integer!(u8);
impl_integer!(u16);
impl_integer!(u32);
impl_integer!(u64);
impl_float!(f32);
impl_float!(f64);

impl NumericElement for CharCode {
    fn swap(self) -> Self {
        self
    }

    fn from_f64(value: f64) -> Self {
        CharCode(value as u8)
    }

    fn to_f64(self) -> f64 {
        self.0 as f64
    }

    fn to_i128(self) -> Option<i128> {
        Some(self.0 as i128)
    }

    fn from_i128(value: i128) -> Self {
        CharCode(value.clamp(0, u8::MAX as i128) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap() {
        assert_eq!(0x0102_0304i32.swap(), 0x0403_0201);
        assert_eq!(7u8.swap(), 7);
        let x = 1.5f64;
        assert_eq!(x.swap().swap().to_bits(), x.to_bits());
        assert_ne!(x.swap().to_bits(), x.to_bits());
    }

    #[test]
    fn test_saturating_conversions() {
        assert_eq!(i8::from_i128(1000), i8::MAX);
        assert_eq!(u16::from_i128(-4), 0);
        assert_eq!(i32::from_f64(f64::NAN), 0);
        assert_eq!(u8::from_f64(300.0), u8::MAX);
        assert_eq!(CharCode::from_i128(65), CharCode(b'A'));
        assert_eq!(2.5f32.to_i128(), None);
    }

    #[test]
    fn test_variant_access() {
        let column = ColumnData::F64(alloc::vec![1.0, 2.0]);
        assert_eq!(f64::slice(&column), Some(&[1.0, 2.0][..]));
        assert!(f32::slice(&column).is_none());
        assert_eq!(<String as Element>::data_type(), DataType::String);
        assert_eq!(i16::from_value(&Value::I16(-3)), Some(-3));
        assert_eq!(i16::from_value(&Value::I32(-3)), None);
    }
}
