//! Dynamically typed values and column buffers
//!
//! [`Value`] holds one element of any kind, [`ColumnData`] a homogeneous
//! vector of elements and [`ArrayData`] an n-dimensional block. Together with
//! [`DataType`] this is the dispatch table for size, swap, parse, format and
//! compare.

use alloc::borrow::Cow;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::format::{DataType, PrintfFormat};
use crate::traits::{CharCode, Element, NumericElement};

/// A single element of any kind
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(CharCode),
    String(String),
}

/// One vector per column, or the flattened elements of an array
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnData {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Char(Vec<CharCode>),
    String(Vec<String>),
}

/// Run `$fixed` for the fixed-width variants and `$string` for strings
macro_rules! dispatch {
    ($data:expr, $values:ident => $fixed:expr, $strings:ident => $string:expr) => {
        match $data {
            ColumnData::I8($values) => $fixed,
            ColumnData::I16($values) => $fixed,
            ColumnData::I32($values) => $fixed,
            ColumnData::I64($values) => $fixed,
            ColumnData::U8($values) => $fixed,
            ColumnData::U16($values) => $fixed,
            ColumnData::U32($values) => $fixed,
            ColumnData::U64($values) => $fixed,
            ColumnData::F32($values) => $fixed,
            ColumnData::F64($values) => $fixed,
            ColumnData::Char($values) => $fixed,
            ColumnData::String($strings) => $string,
        }
    };
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::I8(_) => DataType::I8,
            Value::I16(_) => DataType::I16,
            Value::I32(_) => DataType::I32,
            Value::I64(_) => DataType::I64,
            Value::U8(_) => DataType::U8,
            Value::U16(_) => DataType::U16,
            Value::U32(_) => DataType::U32,
            Value::U64(_) => DataType::U64,
            Value::F32(_) => DataType::F32,
            Value::F64(_) => DataType::F64,
            Value::Char(_) => DataType::Char,
            Value::String(_) => DataType::String,
        }
    }

    /// Zero, `'\0'` or the empty string
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::I8 => Value::I8(0),
            DataType::I16 => Value::I16(0),
            DataType::I32 => Value::I32(0),
            DataType::I64 => Value::I64(0),
            DataType::U8 => Value::U8(0),
            DataType::U16 => Value::U16(0),
            DataType::U32 => Value::U32(0),
            DataType::U64 => Value::U64(0),
            DataType::F32 => Value::F32(0.0),
            DataType::F64 => Value::F64(0.0),
            DataType::Char => Value::Char(CharCode(0)),
            DataType::String => Value::String(String::new()),
        }
    }

    /// Numeric value as f64; characters convert through their code
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::I8(v) => Some(v.to_f64()),
            Value::I16(v) => Some(v.to_f64()),
            Value::I32(v) => Some(v.to_f64()),
            Value::I64(v) => Some(v.to_f64()),
            Value::U8(v) => Some(v.to_f64()),
            Value::U16(v) => Some(v.to_f64()),
            Value::U32(v) => Some(v.to_f64()),
            Value::U64(v) => Some(v.to_f64()),
            Value::F32(v) => Some(v.to_f64()),
            Value::F64(v) => Some(*v),
            Value::Char(v) => Some(v.to_f64()),
            Value::String(_) => None,
        }
    }

    /// Exact integer value, `None` for floats and strings
    pub fn to_i128(&self) -> Option<i128> {
        match self {
            Value::I8(v) => v.to_i128(),
            Value::I16(v) => v.to_i128(),
            Value::I32(v) => v.to_i128(),
            Value::I64(v) => v.to_i128(),
            Value::U8(v) => v.to_i128(),
            Value::U16(v) => v.to_i128(),
            Value::U32(v) => v.to_i128(),
            Value::U64(v) => v.to_i128(),
            Value::Char(v) => v.to_i128(),
            Value::F32(_) | Value::F64(_) | Value::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to another kind
    ///
    /// Numeric and character kinds convert among themselves, saturating at
    /// the bounds of the target. Strings only convert to strings.
    pub fn cast(&self, to: DataType) -> Option<Value> {
        if self.data_type() == to {
            return Some(self.clone());
        }
        ColumnData::from_value(self.clone()).cast(to)?.get(0)
    }

    /// Scan one text token as an element of `data_type`
    pub fn parse(data_type: DataType, token: &str) -> Option<Value> {
        let token = token.trim();
        let value = match data_type {
            DataType::I8 => Value::I8(token.parse().ok()?),
            DataType::I16 => Value::I16(token.parse().ok()?),
            DataType::I32 => Value::I32(token.parse().ok()?),
            DataType::I64 => Value::I64(token.parse().ok()?),
            DataType::U8 => Value::U8(token.parse().ok()?),
            DataType::U16 => Value::U16(token.parse().ok()?),
            DataType::U32 => Value::U32(token.parse().ok()?),
            DataType::U64 => Value::U64(token.parse().ok()?),
            DataType::F32 => Value::F32(token.parse().ok()?),
            DataType::F64 => Value::F64(token.parse().ok()?),
            DataType::Char => Value::Char(parse_char(token)),
            DataType::String => Value::String(token.into()),
        };
        Some(value)
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            // Debug output is the shortest representation that parses back to
            // the same bits, switching to exponent form for extreme magnitudes.
            Value::F32(v) => write!(f, "{v:?}"),
            Value::F64(v) => write!(f, "{v:?}"),
            Value::Char(c) => f.write_str(&escape_char(*c)),
            Value::String(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                value.into_value()
            }
        })*
    };
}

impl_from_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, CharCode, String);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl<T: Element> From<Vec<T>> for ColumnData {
    fn from(values: Vec<T>) -> Self {
        T::into_column(values)
    }
}

impl ColumnData {
    /// Empty buffer of the given kind
    pub fn new(data_type: DataType) -> Self {
        Self::with_capacity(data_type, 0)
    }

    pub fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        match data_type {
            DataType::I8 => ColumnData::I8(Vec::with_capacity(capacity)),
            DataType::I16 => ColumnData::I16(Vec::with_capacity(capacity)),
            DataType::I32 => ColumnData::I32(Vec::with_capacity(capacity)),
            DataType::I64 => ColumnData::I64(Vec::with_capacity(capacity)),
            DataType::U8 => ColumnData::U8(Vec::with_capacity(capacity)),
            DataType::U16 => ColumnData::U16(Vec::with_capacity(capacity)),
            DataType::U32 => ColumnData::U32(Vec::with_capacity(capacity)),
            DataType::U64 => ColumnData::U64(Vec::with_capacity(capacity)),
            DataType::F32 => ColumnData::F32(Vec::with_capacity(capacity)),
            DataType::F64 => ColumnData::F64(Vec::with_capacity(capacity)),
            DataType::Char => ColumnData::Char(Vec::with_capacity(capacity)),
            DataType::String => ColumnData::String(Vec::with_capacity(capacity)),
        }
    }

    /// `len` default elements of the given kind
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::I8 => ColumnData::I8(vec![0; len]),
            DataType::I16 => ColumnData::I16(vec![0; len]),
            DataType::I32 => ColumnData::I32(vec![0; len]),
            DataType::I64 => ColumnData::I64(vec![0; len]),
            DataType::U8 => ColumnData::U8(vec![0; len]),
            DataType::U16 => ColumnData::U16(vec![0; len]),
            DataType::U32 => ColumnData::U32(vec![0; len]),
            DataType::U64 => ColumnData::U64(vec![0; len]),
            DataType::F32 => ColumnData::F32(vec![0.0; len]),
            DataType::F64 => ColumnData::F64(vec![0.0; len]),
            DataType::Char => ColumnData::Char(vec![CharCode(0); len]),
            DataType::String => ColumnData::String(vec![String::new(); len]),
        }
    }

    /// Single-element buffer holding `value`
    pub fn from_value(value: Value) -> Self {
        let mut data = Self::with_capacity(value.data_type(), 1);
        data.push_unchecked(value);
        data
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::I8(_) => DataType::I8,
            ColumnData::I16(_) => DataType::I16,
            ColumnData::I32(_) => DataType::I32,
            ColumnData::I64(_) => DataType::I64,
            ColumnData::U8(_) => DataType::U8,
            ColumnData::U16(_) => DataType::U16,
            ColumnData::U32(_) => DataType::U32,
            ColumnData::U64(_) => DataType::U64,
            ColumnData::F32(_) => DataType::F32,
            ColumnData::F64(_) => DataType::F64,
            ColumnData::Char(_) => DataType::Char,
            ColumnData::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len(), s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        dispatch!(
            self,
            v => v.get(index).map(|x| x.into_value()),
            s => s.get(index).map(|x| Value::String(x.clone()))
        )
    }

    /// Append `value`, converting numeric kinds to this buffer's kind
    ///
    /// Returns `false` when the value cannot be represented, such as a
    /// string pushed onto a numeric buffer.
    pub fn push(&mut self, value: Value) -> bool {
        match value.cast(self.data_type()) {
            Some(value) => {
                self.push_unchecked(value);
                true
            }
            None => false,
        }
    }

    fn push_unchecked(&mut self, value: Value) {
        match (self, value) {
            (ColumnData::I8(v), Value::I8(x)) => v.push(x),
            (ColumnData::I16(v), Value::I16(x)) => v.push(x),
            (ColumnData::I32(v), Value::I32(x)) => v.push(x),
            (ColumnData::I64(v), Value::I64(x)) => v.push(x),
            (ColumnData::U8(v), Value::U8(x)) => v.push(x),
            (ColumnData::U16(v), Value::U16(x)) => v.push(x),
            (ColumnData::U32(v), Value::U32(x)) => v.push(x),
            (ColumnData::U64(v), Value::U64(x)) => v.push(x),
            (ColumnData::F32(v), Value::F32(x)) => v.push(x),
            (ColumnData::F64(v), Value::F64(x)) => v.push(x),
            (ColumnData::Char(v), Value::Char(x)) => v.push(x),
            (ColumnData::String(v), Value::String(x)) => v.push(x),
            _ => {}
        }
    }

    pub fn truncate(&mut self, len: usize) {
        dispatch!(self, v => v.truncate(len), s => s.truncate(len))
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Typed view of the elements, `None` on a kind mismatch
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn strings(&self) -> Option<&[String]> {
        match self {
            ColumnData::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn strings_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            ColumnData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a fixed-width buffer in host order
    pub fn fixed_bytes(&self) -> Option<&[u8]> {
        dispatch!(self, v => Some(bytemuck::cast_slice(v.as_slice())), _s => None)
    }

    pub fn fixed_bytes_mut(&mut self) -> Option<&mut [u8]> {
        dispatch!(
            self,
            v => Some(bytemuck::cast_slice_mut(v.as_mut_slice())),
            _s => None
        )
    }

    /// Reverse the byte order of every element in place
    ///
    /// No-op for 1-byte kinds and strings.
    pub fn swap_bytes(&mut self) {
        if self.data_type().size_bytes() <= 1 {
            return;
        }
        dispatch!(self, v => swap_all(v), _s => {})
    }

    /// Convert every element to another kind, see [`Value::cast`]
    pub fn cast(&self, to: DataType) -> Option<ColumnData> {
        if self.data_type() == to {
            return Some(self.clone());
        }
        dispatch!(self, v => convert_numeric(v, to), _s => None)
    }

    /// Numeric elements widened to f64
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        dispatch!(self, v => Some(v.iter().map(|x| x.to_f64()).collect()), _s => None)
    }

    /// Elements at `indices`, in that order
    pub fn gather(&self, indices: &[usize]) -> ColumnData {
        dispatch!(
            self,
            v => indices.iter().filter_map(|&i| v.get(i).copied()).collect::<Vec<_>>().into(),
            s => ColumnData::String(indices.iter().filter_map(|&i| s.get(i).cloned()).collect())
        )
    }

    /// Text token for element `index`, quoted when needed
    pub fn format_token(&self, index: usize, format: Option<&PrintfFormat>) -> Option<String> {
        let value = self.get(index)?;
        Some(format_token(&value, format))
    }
}

fn swap_all<T: NumericElement>(values: &mut [T]) {
    for v in values.iter_mut() {
        *v = v.swap();
    }
}

fn convert_numeric<S: NumericElement>(values: &[S], to: DataType) -> Option<ColumnData> {
    fn convert<S: NumericElement, T: NumericElement>(values: &[S]) -> Vec<T> {
        values
            .iter()
            .map(|&v| match v.to_i128() {
                Some(i) => T::from_i128(i),
                None => T::from_f64(v.to_f64()),
            })
            .collect()
    }

    let data = match to {
        DataType::I8 => ColumnData::I8(convert(values)),
        DataType::I16 => ColumnData::I16(convert(values)),
        DataType::I32 => ColumnData::I32(convert(values)),
        DataType::I64 => ColumnData::I64(convert(values)),
        DataType::U8 => ColumnData::U8(convert(values)),
        DataType::U16 => ColumnData::U16(convert(values)),
        DataType::U32 => ColumnData::U32(convert(values)),
        DataType::U64 => ColumnData::U64(convert(values)),
        DataType::F32 => ColumnData::F32(convert(values)),
        DataType::F64 => ColumnData::F64(convert(values)),
        DataType::Char => ColumnData::Char(convert(values)),
        DataType::String => return None,
    };
    Some(data)
}

/// An n-dimensional block, elements flattened in row-major order
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayData {
    pub dims: Vec<u32>,
    pub data: ColumnData,
}

impl ArrayData {
    /// Zero-sized block with `ndim` dimensions
    pub fn empty(data_type: DataType, ndim: usize) -> Self {
        Self {
            dims: vec![0; ndim],
            data: ColumnData::new(data_type),
        }
    }

    /// Number of elements implied by the dimensions, `None` on overflow
    pub fn element_count(&self) -> Option<usize> {
        crate::validation::checked_element_count(&self.dims)
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }
}

/// Three-way comparison of two values
///
/// Same-kind values compare naturally, with floats ordered by `total_cmp`
/// and strings byte-lexicographically. Mixed numeric kinds compare through
/// f64; otherwise the kinds themselves are ordered.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::F32(x), Value::F32(y)) => x.total_cmp(y),
        (Value::F64(x), Value::F64(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        _ => match (a.to_i128(), b.to_i128()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (a.to_f64(), b.to_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.data_type().cmp(&b.data_type()),
            },
        },
    }
}

/// Render `value` as text, applying `format` when given
///
/// The result is not quoted; see [`format_token`] for data lines.
pub fn format_value(value: &Value, format: Option<&PrintfFormat>) -> String {
    match format {
        Some(format) => format.render(value),
        None => value.to_string(),
    }
}

/// Render `value` as a whitespace-delimited token
pub fn format_token(value: &Value, format: Option<&PrintfFormat>) -> String {
    let text = format_value(value, format);
    match value {
        Value::String(_) => quote(&text).into_owned(),
        _ => text,
    }
}

/// Quote a string if it is blank, contains whitespace, quotes or
/// backslashes, or would be read back as a comment
///
/// Line breaks become `\n` and `\r` so a quoted token stays on one line.
pub fn quote(text: &str) -> Cow<'_, str> {
    let needs_quotes = text.is_empty()
        || text.starts_with('!')
        || text
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    Cow::Owned(out)
}

/// Whitespace-delimited tokens of a data line, with quotes removed
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    /// Unconsumed remainder of the line
    pub fn remainder(&self) -> &'a str {
        self.rest
    }
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = self.rest.trim_start();
        if rest.is_empty() {
            self.rest = rest;
            return None;
        }
        if let Some(quoted) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = quoted.char_indices();
            let mut end = quoted.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        match chars.next() {
                            Some((_, 'n')) => out.push('\n'),
                            Some((_, 'r')) => out.push('\r'),
                            Some((_, escaped)) => out.push(escaped),
                            None => {}
                        }
                    }
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    _ => out.push(c),
                }
            }
            self.rest = &quoted[end..];
            Some(out)
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            self.rest = &rest[end..];
            Some(rest[..end].into())
        }
    }
}

/// Value of a string parameter line
///
/// A leading quote delimits the value; otherwise the whole trimmed line is the
/// value.
pub fn unquote_line(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.starts_with('"') {
        Tokens::new(trimmed).next().unwrap_or_default()
    } else {
        trimmed.into()
    }
}

/// Character token: a literal byte or a `\ooo` octal escape
fn parse_char(token: &str) -> CharCode {
    let bytes = token.as_bytes();
    match bytes {
        [] => CharCode(0),
        [b'\\', rest @ ..] if !rest.is_empty() => {
            let octal: Vec<u8> = rest.iter().take(3).copied().take_while(|b| (b'0'..=b'7').contains(b)).collect();
            if octal.is_empty() {
                CharCode(rest[0])
            } else {
                let code = octal.iter().fold(0u32, |acc, d| acc * 8 + (d - b'0') as u32);
                CharCode(code.min(255) as u8)
            }
        }
        [first, ..] => CharCode(*first),
    }
}

fn escape_char(c: CharCode) -> String {
    let byte = c.0;
    if byte.is_ascii_graphic() && byte != b'"' && byte != b'\\' && byte != b'!' {
        char::from(byte).to_string()
    } else {
        alloc::format!("\\{byte:03o}")
    }
}
