//! Tokenizer for `&name key=value, ... &end` header directives

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};

use crate::error::{Result, SddsError};

/// One parsed header directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl Directive {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn at_end_marker(&self) -> bool {
        let rest = self.rest();
        rest.starts_with("&end")
            && rest[4..]
                .chars()
                .next()
                .map_or(true, |c| c.is_whitespace() || c == ',')
    }

    fn word(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == '=' || (c == '&' && self.pos > start) {
                break;
            }
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn value(&mut self) -> Option<String> {
        if self.peek() == Some('"') {
            self.bump();
            let mut out = String::new();
            loop {
                match self.bump()? {
                    '\\' => out.push(self.bump()?),
                    '"' => return Some(out),
                    c => out.push(c),
                }
            }
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || self.at_end_marker() {
                break;
            }
            self.bump();
        }
        Some(self.text[start..self.pos].into())
    }
}

/// Check whether `text` contains the closing `&end` outside quotes
pub fn is_complete(text: &str) -> bool {
    let mut scanner = Scanner { text, pos: 0 };
    let mut quoted = false;
    while let Some(c) = scanner.peek() {
        if !quoted && scanner.at_end_marker() {
            return true;
        }
        scanner.bump();
        match c {
            '\\' if quoted => {
                scanner.bump();
            }
            '"' => quoted = !quoted,
            _ => {}
        }
    }
    false
}

/// Parse one complete directive
///
/// `line` is the header line number used in error messages.
pub fn parse_directive(text: &str, line: usize) -> Result<Directive> {
    let malformed = |reason: &str| SddsError::MalformedHeader {
        line,
        reason: reason.into(),
    };
    let mut scanner = Scanner { text, pos: 0 };
    scanner.skip_separators();
    if scanner.bump() != Some('&') {
        return Err(malformed("directive must start with '&'"));
    }
    let name = scanner.word();
    if name.is_empty() {
        return Err(malformed("directive has no name"));
    }
    let mut directive = Directive {
        name: name.into(),
        attributes: Vec::new(),
    };

    loop {
        scanner.skip_separators();
        if scanner.at_end_marker() {
            return Ok(directive);
        }
        if scanner.peek().is_none() {
            return Err(malformed("missing &end"));
        }
        let key = scanner.word();
        if key.is_empty() {
            return Err(malformed("expected attribute name"));
        }
        let key = String::from(key);
        while scanner.peek().is_some_and(char::is_whitespace) {
            scanner.bump();
        }
        if scanner.bump() != Some('=') {
            return Err(SddsError::MalformedHeader {
                line,
                reason: alloc::format!("attribute {key} has no value"),
            });
        }
        while scanner.peek().is_some_and(char::is_whitespace) {
            scanner.bump();
        }
        let value = scanner
            .value()
            .ok_or_else(|| malformed("unterminated quoted value"))?;
        directive.attributes.push((key, value));
    }
}

/// Quote a header value if it is empty or holds separators
pub fn quote_value(value: &str) -> Cow<'_, str> {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '=' | '"' | '\\' | '&' | '!'));
    if !needs_quotes {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Cow::Owned(out)
}

/// Writes `&name key=value, ... &end` lines
pub struct DirectiveWriter<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> DirectiveWriter<'w, W> {
    pub fn start(out: &'w mut W, name: &str) -> core::result::Result<Self, fmt::Error> {
        write!(out, "&{name} ")?;
        Ok(Self { out })
    }

    pub fn attribute(&mut self, key: &str, value: &str) -> fmt::Result {
        write!(self.out, "{key}={}, ", quote_value(value))
    }

    pub fn optional(&mut self, key: &str, value: Option<&str>) -> fmt::Result {
        match value {
            Some(value) => self.attribute(key, value),
            None => Ok(()),
        }
    }

    pub fn finish(self) -> fmt::Result {
        self.out.write_str("&end\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive() {
        let text = "&column name=x, type=double, units=\"m s\", description=\"a \\\"b\\\"\", &end";
        assert!(is_complete(text));
        let directive = parse_directive(text, 2).unwrap();
        assert_eq!(directive.name, "column");
        assert_eq!(directive.get("name"), Some("x"));
        assert_eq!(directive.get("units"), Some("m s"));
        assert_eq!(directive.get("description"), Some("a \"b\""));
    }

    #[test]
    fn test_multi_line_and_quoted_end() {
        let first = "&parameter name=p, description=\"not &end here\",";
        assert!(!is_complete(first));
        let full = alloc::format!("{first} type=long &end");
        assert!(is_complete(&full));
        let directive = parse_directive(&full, 3).unwrap();
        assert_eq!(directive.get("description"), Some("not &end here"));
        assert_eq!(directive.get("type"), Some("long"));
    }

    #[test]
    fn test_tight_end_marker() {
        let directive = parse_directive("&data mode=binary,&end", 1).unwrap();
        assert_eq!(directive.get("mode"), Some("binary"));
        let directive = parse_directive("&description &end", 1).unwrap();
        assert!(directive.attributes.is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            parse_directive("&column name &end", 7),
            Err(SddsError::MalformedHeader { line: 7, .. })
        ));
        assert!(parse_directive("column name=x &end", 1).is_err());
        assert!(parse_directive("&column name=\"x &end", 1).is_err());
    }

    #[test]
    fn test_writer_round_trip() {
        let mut out = String::new();
        let mut writer = DirectiveWriter::start(&mut out, "column").unwrap();
        writer.attribute("name", "x").unwrap();
        writer.attribute("units", "m, s").unwrap();
        writer.optional("symbol", None).unwrap();
        writer.finish().unwrap();
        assert_eq!(out, "&column name=x, units=\"m, s\", &end\n");
        let directive = parse_directive(&out, 1).unwrap();
        assert_eq!(directive.get("units"), Some("m, s"));
    }
}
