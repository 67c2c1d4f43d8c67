//! printf-style format strings for `format_string=` attributes
//!
//! A format holds exactly one conversion, optionally surrounded by literal
//! text. Rendering follows C semantics for the flags, width and precision
//! that SDDS headers use in practice.

use alloc::format;
use alloc::string::{String, ToString};

use crate::error::{Result, SddsError};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Signed,
    Unsigned,
    Hex { upper: bool },
    Octal,
    Exponent { upper: bool },
    Fixed,
    General { upper: bool },
    Str,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
}

/// A parsed printf-style format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintfFormat {
    source: String,
    prefix: String,
    suffix: String,
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: Conversion,
}

impl PrintfFormat {
    /// Parse a format string such as `%10.4lf` or `x=%d`
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = || SddsError::InvalidFormat {
            format: source.into(),
        };
        let bytes = source.as_bytes();
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec = None;
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i];
            if c != b'%' {
                let end = source[i..].find('%').map_or(bytes.len(), |p| i + p);
                let literal = &source[i..end];
                if spec.is_none() {
                    prefix.push_str(literal);
                } else {
                    suffix.push_str(literal);
                }
                i = end;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'%') {
                if spec.is_none() {
                    prefix.push('%');
                } else {
                    suffix.push('%');
                }
                i += 2;
                continue;
            }
            if spec.is_some() {
                return Err(invalid());
            }
            i += 1;

            let mut flags = Flags::default();
            while let Some(&c) = bytes.get(i) {
                match c {
                    b'-' => flags.left = true,
                    b'+' => flags.plus = true,
                    b' ' => flags.space = true,
                    b'0' => flags.zero = true,
                    b'#' => flags.alternate = true,
                    _ => break,
                }
                i += 1;
            }

            let width = take_number(bytes, &mut i);
            let precision = if bytes.get(i) == Some(&b'.') {
                i += 1;
                Some(take_number(bytes, &mut i).unwrap_or(0))
            } else {
                None
            };

            while let Some(b'h' | b'l' | b'L' | b'q' | b'j' | b'z' | b't') = bytes.get(i) {
                i += 1;
            }

            let conversion = match bytes.get(i) {
                Some(b'd' | b'i') => Conversion::Signed,
                Some(b'u') => Conversion::Unsigned,
                Some(b'x') => Conversion::Hex { upper: false },
                Some(b'X') => Conversion::Hex { upper: true },
                Some(b'o') => Conversion::Octal,
                Some(b'e') => Conversion::Exponent { upper: false },
                Some(b'E') => Conversion::Exponent { upper: true },
                Some(b'f' | b'F') => Conversion::Fixed,
                Some(b'g') => Conversion::General { upper: false },
                Some(b'G') => Conversion::General { upper: true },
                Some(b's') => Conversion::Str,
                Some(b'c') => Conversion::Char,
                _ => return Err(invalid()),
            };
            i += 1;
            spec = Some((flags, width, precision, conversion));
        }

        let (flags, width, precision, conversion) = spec.ok_or_else(invalid)?;
        Ok(Self {
            source: source.into(),
            prefix,
            suffix,
            flags,
            width,
            precision,
            conversion,
        })
    }

    /// The format string as written in the header
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether this format renders numbers
    pub fn is_numeric(&self) -> bool {
        !matches!(self.conversion, Conversion::Str | Conversion::Char)
    }

    /// Render one value
    pub fn render(&self, value: &Value) -> String {
        let mut out = String::with_capacity(self.prefix.len() + self.suffix.len() + 16);
        out.push_str(&self.prefix);
        out.push_str(&self.render_conversion(value));
        out.push_str(&self.suffix);
        out
    }

    fn render_conversion(&self, value: &Value) -> String {
        match self.conversion {
            Conversion::Str => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let text = match self.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                self.pad("", "", &text, false)
            }
            Conversion::Char => {
                let c = match value {
                    Value::Char(c) => char::from(c.0),
                    other => match other.to_i128() {
                        Some(code) => char::from(code.clamp(0, 255) as u8),
                        None => other.to_string().chars().next().unwrap_or(' '),
                    },
                };
                let mut text = String::new();
                text.push(c);
                self.pad("", "", &text, false)
            }
            Conversion::Signed | Conversion::Unsigned | Conversion::Hex { .. } | Conversion::Octal => {
                let Some(integer) = value.to_i128().or_else(|| value.to_f64().map(|f| f as i128))
                else {
                    return self.pad("", "", &value.to_string(), false);
                };
                self.render_integer(integer)
            }
            Conversion::Exponent { .. } | Conversion::Fixed | Conversion::General { .. } => {
                let Some(float) = value.to_f64() else {
                    return self.pad("", "", &value.to_string(), false);
                };
                self.render_float(float)
            }
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.flags.plus {
            "+"
        } else if self.flags.space {
            " "
        } else {
            ""
        }
    }

    fn render_integer(&self, value: i128) -> String {
        let (sign, magnitude) = match self.conversion {
            Conversion::Signed => (self.sign(value < 0), value.unsigned_abs()),
            // Negative values wrap at 64 bits, as C does for `long`.
            _ if value < 0 => ("", (value as i64 as u64) as u128),
            _ => ("", value as u128),
        };
        let mut digits = match self.conversion {
            Conversion::Hex { upper: false } => format!("{magnitude:x}"),
            Conversion::Hex { upper: true } => format!("{magnitude:X}"),
            Conversion::Octal => format!("{magnitude:o}"),
            _ => magnitude.to_string(),
        };
        if let Some(precision) = self.precision {
            while digits.len() < precision {
                digits.insert(0, '0');
            }
        }
        let radix_prefix = match self.conversion {
            Conversion::Hex { upper: false } if self.flags.alternate && magnitude != 0 => "0x",
            Conversion::Hex { upper: true } if self.flags.alternate && magnitude != 0 => "0X",
            Conversion::Octal if self.flags.alternate && !digits.starts_with('0') => "0",
            _ => "",
        };
        self.pad(sign, radix_prefix, &digits, self.precision.is_none())
    }

    fn render_float(&self, value: f64) -> String {
        let upper = matches!(
            self.conversion,
            Conversion::Exponent { upper: true } | Conversion::General { upper: true }
        );
        let sign = self.sign(value.is_sign_negative() && !value.is_nan());
        if !value.is_finite() {
            let body = match (value.is_nan(), upper) {
                (true, false) => "nan",
                (true, true) => "NAN",
                (false, false) => "inf",
                (false, true) => "INF",
            };
            return self.pad(sign, "", body, false);
        }

        let magnitude = value.abs();
        let precision = self.precision.unwrap_or(6);
        let body = match self.conversion {
            Conversion::Fixed => {
                let mut body = format!("{magnitude:.precision$}");
                if self.flags.alternate && precision == 0 {
                    body.push('.');
                }
                body
            }
            Conversion::Exponent { .. } => {
                c_exponent(magnitude, precision, upper, self.flags.alternate)
            }
            _ => {
                let significant = precision.max(1);
                let exponent = if magnitude == 0.0 {
                    0
                } else {
                    split_exponent(&format!("{:.*e}", significant - 1, magnitude)).1
                };
                let body = if exponent >= -4 && exponent < significant as i32 {
                    let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
                    format!("{magnitude:.decimals$}")
                } else {
                    c_exponent(magnitude, significant - 1, upper, self.flags.alternate)
                };
                if self.flags.alternate {
                    body
                } else {
                    strip_trailing_zeros(&body)
                }
            }
        };
        self.pad(sign, "", &body, true)
    }

    fn pad(&self, sign: &str, radix_prefix: &str, body: &str, zero_fill: bool) -> String {
        let len = sign.len() + radix_prefix.len() + body.chars().count();
        let fill = self.width.map_or(0, |w| w.saturating_sub(len));
        let mut out = String::with_capacity(len + fill);
        if self.flags.left {
            out.push_str(sign);
            out.push_str(radix_prefix);
            out.push_str(body);
            out.extend(core::iter::repeat(' ').take(fill));
        } else if self.flags.zero && zero_fill {
            out.push_str(sign);
            out.push_str(radix_prefix);
            out.extend(core::iter::repeat('0').take(fill));
            out.push_str(body);
        } else {
            out.extend(core::iter::repeat(' ').take(fill));
            out.push_str(sign);
            out.push_str(radix_prefix);
            out.push_str(body);
        }
        out
    }
}

impl core::fmt::Display for PrintfFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.source)
    }
}

fn take_number(bytes: &[u8], i: &mut usize) -> Option<usize> {
    let start = *i;
    let mut n: usize = 0;
    while let Some(&c) = bytes.get(*i) {
        if !c.is_ascii_digit() {
            break;
        }
        n = n.saturating_mul(10).saturating_add((c - b'0') as usize);
        *i += 1;
    }
    (*i > start).then_some(n)
}

/// Split Rust's `1.5e-7` exponent notation into mantissa and exponent
fn split_exponent(formatted: &str) -> (&str, i32) {
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse().unwrap_or(0)),
        None => (formatted, 0),
    }
}

/// C-style `%e`: at least two exponent digits and an explicit sign
fn c_exponent(magnitude: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let formatted = format!("{magnitude:.precision$e}");
    let (mantissa, exponent) = split_exponent(&formatted);
    let mut out = String::from(mantissa);
    if alternate && precision == 0 {
        out.push('.');
    }
    out.push(if upper { 'E' } else { 'e' });
    out.push(if exponent < 0 { '-' } else { '+' });
    out.push_str(&format!("{:02}", exponent.unsigned_abs()));
    out
}

fn strip_trailing_zeros(body: &str) -> String {
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(p) => body.split_at(p),
        None => (body, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    let mut out = String::from(mantissa);
    out.push_str(exponent);
    out
}
