//! SDDS header parsing and emission
//!
//! The header is line-oriented text: a `SDDS<version>` magic line, then one
//! directive per definition, terminated by `&data`. [`HeaderParser`] is fed a
//! line at a time so callers control how bytes are read; [`write_header`]
//! emits the same grammar.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::{self, Write};

use super::constants::{ENDIAN_COMMENT_PREFIX, MAGIC, MIN_VERSION, VERSION};
use super::namelist::{is_complete, parse_directive, Directive, DirectiveWriter};
use super::{DataMode, DataType, Encoding, Endianness, MajorOrder};
use crate::error::{Result, SddsError, Severity};
use crate::layout::{AssociateDef, FieldDef, FieldKind, Layout};

/// Result of feeding one header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProgress {
    /// More header lines are required
    NeedMore,
    /// The `&data` directive was read; page data follows
    Complete,
}

/// Incremental header parser building a [`Layout`]
#[derive(Debug, Default)]
pub struct HeaderParser {
    layout: Layout,
    version: Option<u32>,
    line: usize,
    pending: String,
    pending_start: usize,
    endian_comment: Option<Endianness>,
    warnings: Vec<SddsError>,
    complete: bool,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept field names outside the usual character set
    pub fn allow_any_name(mut self, allow: bool) -> Self {
        self.layout.allow_any_name(allow);
        self
    }

    /// Protocol version from the magic line
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Warnings such as unknown attributes, drained
    pub fn take_warnings(&mut self) -> Vec<SddsError> {
        core::mem::take(&mut self.warnings)
    }

    /// Feed one header line, without or with its line terminator
    pub fn feed_line(&mut self, line: &str) -> Result<HeaderProgress> {
        if self.complete {
            return Ok(HeaderProgress::Complete);
        }
        self.line += 1;
        let line = line.trim_end_matches(['\n', '\r']);

        if self.version.is_none() {
            self.version = Some(parse_magic(line)?);
            log::debug!("SDDS header version {}", self.version.unwrap_or(VERSION));
            return Ok(HeaderProgress::NeedMore);
        }

        if self.pending.is_empty() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                return Ok(HeaderProgress::NeedMore);
            }
            if let Some(comment) = trimmed.strip_prefix(ENDIAN_COMMENT_PREFIX) {
                match comment.trim() {
                    "little-endian" => self.endian_comment = Some(Endianness::Little),
                    "big-endian" => self.endian_comment = Some(Endianness::Big),
                    _ => {}
                }
                return Ok(HeaderProgress::NeedMore);
            }
            if trimmed.starts_with('!') {
                return Ok(HeaderProgress::NeedMore);
            }
            if !trimmed.starts_with('&') {
                return Err(SddsError::MalformedHeader {
                    line: self.line,
                    reason: alloc::format!("expected a directive, found {trimmed:?}"),
                });
            }
            self.pending_start = self.line;
        } else {
            self.pending.push(' ');
        }
        self.pending.push_str(line);

        if !is_complete(&self.pending) {
            return Ok(HeaderProgress::NeedMore);
        }
        let directive = parse_directive(&self.pending, self.pending_start)?;
        self.pending.clear();
        self.apply(directive)
    }

    fn apply(&mut self, directive: Directive) -> Result<HeaderProgress> {
        let line = self.pending_start;
        match directive.name.as_str() {
            "description" => {
                for (key, _) in &directive.attributes {
                    if key != "text" && key != "contents" {
                        self.warn_attribute("description", key);
                    }
                }
                self.layout
                    .set_description(directive.get("text"), directive.get("contents"))?;
            }
            "column" | "parameter" | "array" => {
                let def = field_from_directive(&directive, line, &mut self.warnings)?;
                self.layout.define(def)?;
            }
            "associate" => {
                let associate = associate_from_directive(&directive, line, &mut self.warnings)?;
                self.layout.define_associate(associate)?;
            }
            "data" => {
                let mode = self.data_mode(&directive, line)?;
                log::debug!(
                    "header complete: {} columns, {} parameters, {} arrays, {} {} major",
                    self.layout.columns().len(),
                    self.layout.parameters().len(),
                    self.layout.arrays().len(),
                    mode.encoding.as_str(),
                    mode.major_order.as_str(),
                );
                self.layout.set_data_mode(mode)?;
                self.complete = true;
                return Ok(HeaderProgress::Complete);
            }
            other => {
                return Err(SddsError::UnknownDirective {
                    name: other.into(),
                    in_header: true,
                })
            }
        }
        Ok(HeaderProgress::NeedMore)
    }

    fn data_mode(&mut self, directive: &Directive, line: usize) -> Result<DataMode> {
        let mut mode = DataMode::default();
        let mut endian = self.endian_comment;
        let mut column_count = None;
        for (key, value) in &directive.attributes {
            let value = value.as_str();
            match key.as_str() {
                "mode" => mode.encoding = at_line(value.parse::<Encoding>(), line)?,
                "endian" => endian = Some(at_line(value.parse::<Endianness>(), line)?),
                "major_order" => mode.major_order = at_line(value.parse::<MajorOrder>(), line)?,
                "column_major_order" => {
                    if parse_flag(value, key, line)? {
                        mode.major_order = MajorOrder::Column;
                    }
                }
                "no_row_counts" => mode.no_row_counts = parse_flag(value, key, line)?,
                "additional_header_lines" => {
                    mode.additional_header_lines = parse_number(value, key, line)?
                }
                "column_count" => column_count = Some(parse_number::<usize>(value, key, line)?),
                "lines_per_row" => {}
                other => self.warn_attribute("data", other),
            }
        }
        mode.endianness = endian.unwrap_or(Endianness::NATIVE);
        if let Some(count) = column_count {
            let defined = self.layout.columns().len();
            if count != defined {
                self.warnings.push(SddsError::Message {
                    severity: Severity::Warning,
                    message: alloc::format!(
                        "&data declares {count} columns but {defined} are defined"
                    ),
                });
            }
        }
        Ok(mode)
    }

    fn warn_attribute(&mut self, directive: &str, attribute: &str) {
        self.warnings.push(SddsError::UnknownAttribute {
            directive: directive.into(),
            attribute: attribute.into(),
        });
    }

    /// Consume the parser and return the finished layout
    ///
    /// Fails with `Truncated` if `&data` was never seen.
    pub fn finish(self) -> Result<Layout> {
        if self.version.is_none() {
            return Err(SddsError::NotAFormatFile {
                found: String::new(),
            });
        }
        if !self.complete {
            return Err(SddsError::Truncated {
                page: 0,
                context: "header".into(),
            });
        }
        Ok(self.layout)
    }
}

fn parse_magic(line: &str) -> Result<u32> {
    let not_sdds = || SddsError::NotAFormatFile {
        found: line.chars().take(40).collect(),
    };
    let version = line
        .trim_end()
        .strip_prefix(MAGIC)
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(not_sdds)?;
    if !(MIN_VERSION..=VERSION).contains(&version) {
        return Err(not_sdds());
    }
    Ok(version)
}

fn at_line<T>(result: Result<T>, line: usize) -> Result<T> {
    result.map_err(|err| match err {
        SddsError::MalformedHeader { reason, .. } => SddsError::MalformedHeader { line, reason },
        other => other,
    })
}

fn parse_number<T: core::str::FromStr>(value: &str, key: &str, line: usize) -> Result<T> {
    value.trim().parse().map_err(|_| SddsError::MalformedHeader {
        line,
        reason: alloc::format!("{key} expects a number, found {value:?}"),
    })
}

fn parse_flag(value: &str, key: &str, line: usize) -> Result<bool> {
    Ok(parse_number::<i64>(value, key, line)? != 0)
}

/// Build a definition from a `&column`, `&parameter` or `&array` directive
///
/// Unknown attributes are appended to `warnings`.
pub fn field_from_directive(
    directive: &Directive,
    line: usize,
    warnings: &mut Vec<SddsError>,
) -> Result<FieldDef> {
    let kind = match directive.name.as_str() {
        "column" => FieldKind::Column,
        "parameter" => FieldKind::Parameter,
        "array" => FieldKind::Array,
        other => {
            return Err(SddsError::UnknownDirective {
                name: other.into(),
                in_header: false,
            })
        }
    };
    let name = directive.get("name").ok_or_else(|| SddsError::MalformedHeader {
        line,
        reason: alloc::format!("&{kind} without a name"),
    })?;
    let data_type = directive
        .get("type")
        .ok_or_else(|| SddsError::InvalidType(String::new()))?
        .parse::<DataType>()?;

    let mut def = match kind {
        FieldKind::Column => FieldDef::column(name, data_type),
        FieldKind::Parameter => FieldDef::parameter(name, data_type),
        FieldKind::Array => FieldDef::array(name, data_type, 1),
    };
    for (key, value) in &directive.attributes {
        match (key.as_str(), kind) {
            ("name" | "type", _) => {}
            ("symbol", _) => def.symbol = Some(value.clone()),
            ("units", _) => def.units = Some(value.clone()),
            ("description", _) => def.description = Some(value.clone()),
            ("format_string", _) => def.format_string = Some(value.clone()),
            ("fixed_value", FieldKind::Parameter) => def.fixed_value = Some(value.clone()),
            ("field_length", FieldKind::Column | FieldKind::Array) => {
                def.field_length = parse_number(value, key, line)?
            }
            ("dimensions", FieldKind::Array) => def.dimensions = parse_number(value, key, line)?,
            ("group_name", FieldKind::Array) => def.group_name = Some(value.clone()),
            (other, _) => warnings.push(SddsError::UnknownAttribute {
                directive: kind.directive().into(),
                attribute: other.into(),
            }),
        }
    }
    Ok(def)
}

/// Parse a single definition directive written out as text
pub fn field_from_text(text: &str, warnings: &mut Vec<SddsError>) -> Result<FieldDef> {
    let directive = parse_directive(text, 1)?;
    field_from_directive(&directive, 1, warnings)
}

fn associate_from_directive(
    directive: &Directive,
    line: usize,
    warnings: &mut Vec<SddsError>,
) -> Result<AssociateDef> {
    let name = directive.get("name").ok_or_else(|| SddsError::MalformedHeader {
        line,
        reason: "&associate without a name".into(),
    })?;
    let mut associate = AssociateDef::new(name);
    for (key, value) in &directive.attributes {
        match key.as_str() {
            "name" => {}
            "filename" => associate.filename = Some(value.clone()),
            "path" => associate.path = Some(value.clone()),
            "description" => associate.description = Some(value.clone()),
            "contents" => associate.contents = Some(value.clone()),
            "sdds" => associate.sdds = parse_flag(value, key, line)?,
            other => warnings.push(SddsError::UnknownAttribute {
                directive: "associate".into(),
                attribute: other.into(),
            }),
        }
    }
    Ok(associate)
}

fn write_field<W: Write>(out: &mut W, def: &FieldDef) -> fmt::Result {
    let mut w = DirectiveWriter::start(out, def.kind.directive())?;
    w.attribute("name", &def.name)?;
    w.optional("symbol", def.symbol.as_deref())?;
    w.optional("units", def.units.as_deref())?;
    w.optional("description", def.description.as_deref())?;
    w.optional("format_string", def.format_string.as_deref())?;
    w.attribute("type", def.data_type.header_name())?;
    match def.kind {
        FieldKind::Parameter => w.optional("fixed_value", def.fixed_value.as_deref())?,
        FieldKind::Column | FieldKind::Array => {
            if def.field_length != 0 {
                w.attribute("field_length", &def.field_length.to_string())?;
            }
        }
    }
    if def.kind == FieldKind::Array {
        w.optional("group_name", def.group_name.as_deref())?;
        w.attribute("dimensions", &def.dimensions.to_string())?;
    }
    w.finish()
}

/// Emit the full header for `layout`, ending with the `&data` line
pub fn write_header<W: Write>(layout: &Layout, out: &mut W) -> fmt::Result {
    let mode = layout.data_mode();
    writeln!(out, "{MAGIC}{VERSION}")?;
    if mode.is_binary() {
        writeln!(out, "{ENDIAN_COMMENT_PREFIX} {}-endian", mode.endianness.as_str())?;
    }
    if layout.description().is_some() || layout.contents().is_some() {
        let mut w = DirectiveWriter::start(out, "description")?;
        w.optional("text", layout.description())?;
        w.optional("contents", layout.contents())?;
        w.finish()?;
    }
    for associate in layout.associates() {
        let mut w = DirectiveWriter::start(out, "associate")?;
        w.attribute("name", &associate.name)?;
        w.optional("filename", associate.filename.as_deref())?;
        w.optional("path", associate.path.as_deref())?;
        w.optional("description", associate.description.as_deref())?;
        w.optional("contents", associate.contents.as_deref())?;
        w.attribute("sdds", if associate.sdds { "1" } else { "0" })?;
        w.finish()?;
    }
    for kind in [FieldKind::Parameter, FieldKind::Array, FieldKind::Column] {
        for def in layout.fields(kind) {
            write_field(out, def)?;
        }
    }

    let mut w = DirectiveWriter::start(out, "data")?;
    w.attribute("mode", mode.encoding.as_str())?;
    if mode.is_binary() {
        w.attribute("endian", mode.endianness.as_str())?;
    }
    w.attribute("major_order", mode.major_order.as_str())?;
    if mode.is_binary() {
        w.attribute("column_count", &layout.columns().len().to_string())?;
    } else if mode.no_row_counts {
        w.attribute("no_row_counts", "1")?;
    }
    w.finish()
}
