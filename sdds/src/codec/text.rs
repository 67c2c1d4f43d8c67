//! Text page bodies
//!
//! Each page opens with a `! page number N` comment. Parameters follow one
//! per line, then each array as a dimension line and its elements, the row
//! count line and the rows. Row-major pages write one row per line and
//! column-major pages one block per column. With `no_row_counts` the count is
//! omitted and the page ends at a blank line.
//!
//! Lines starting with `!` are comments wherever a line or token is expected.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use sdds_core::validation::checked_element_count;
use sdds_core::value::{format_token, unquote_line, Tokens};
use sdds_core::{
    ArrayData, ColumnData, FieldDef, Layout, MajorOrder, PrintfFormat, Result, SddsError, Value,
};

use super::{
    decode_utf8, fixed_parameter, malformed, settle_rows, truncated, DecodeContext, Decoded, PREALLOC_LIMIT,
};
use crate::page::{Page, PageBody};

/// Elements per line in array and column blocks
const TOKENS_PER_LINE: usize = 10;

struct TextReader<'a, R> {
    src: &'a mut R,
    page: u32,
    lookahead: Option<String>,
    pending: VecDeque<String>,
    lossy: usize,
}

impl<R: BufRead> TextReader<'_, R> {
    fn read_raw(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        if self.src.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(decode_utf8(buf, &mut self.lossy)))
    }

    /// Next line that is not a comment
    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.lookahead.take() {
            return Ok(Some(line));
        }
        loop {
            match self.read_raw()? {
                None => return Ok(None),
                Some(line) if line.trim_start().starts_with('!') => continue,
                Some(line) => return Ok(Some(line)),
            }
        }
    }

    /// Next non-blank line, `None` at end of stream
    fn next_content_line(&mut self) -> Result<Option<String>> {
        loop {
            match self.next_line()? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    fn next_token(&mut self, context: &str) -> Result<String> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            match self.next_line()? {
                Some(line) => self.pending.extend(Tokens::new(&line)),
                None => return Err(truncated(self.page, context)),
            }
        }
    }

    /// Drop the rest of the current line
    fn end_line(&mut self) {
        self.pending.clear();
    }

    fn read_parameter(&mut self, def: &FieldDef) -> Result<Value> {
        let line = self
            .next_line()?
            .ok_or_else(|| truncated(self.page, &def.name))?;
        if line.trim().is_empty() {
            return Err(SddsError::MissingParameter {
                name: def.name.clone(),
            });
        }
        if def.data_type.is_string() {
            return Ok(Value::String(unquote_line(&line)));
        }
        let token = Tokens::new(&line).next().unwrap_or_default();
        parse_token(def, None, token)
    }

    fn read_array(&mut self, def: &FieldDef) -> Result<ArrayData> {
        let mut dims = Vec::with_capacity(def.dimensions as usize);
        for _ in 0..def.dimensions {
            let token = self.next_token(&def.name)?;
            let dim = token.parse::<u32>().map_err(|_| {
                malformed(self.page, format!("array {} has dimension {token:?}", def.name))
            })?;
            dims.push(dim);
        }
        self.end_line();
        let count = checked_element_count(&dims).ok_or_else(|| {
            malformed(self.page, format!("array {} dimensions {dims:?} overflow", def.name))
        })?;
        let mut data = ColumnData::with_capacity(def.data_type, count.min(PREALLOC_LIMIT));
        for i in 0..count {
            let token = self.next_token(&def.name)?;
            push_token(&mut data, def, Some(i), token)?;
        }
        self.end_line();
        Ok(ArrayData { dims, data })
    }

    fn read_row_count(&mut self) -> Result<usize> {
        let line = self
            .next_content_line()?
            .ok_or_else(|| truncated(self.page, "row count"))?;
        let token = Tokens::new(&line).next().unwrap_or_default();
        let rows = token
            .parse::<u64>()
            .map_err(|_| malformed(self.page, format!("row count {token:?} is not an integer")))?;
        // Same bound as the u32 count of binary pages.
        u32::try_from(rows)
            .map(|rows| rows as usize)
            .map_err(|_| malformed(self.page, format!("row count {rows} is out of range")))
    }

    fn read_rows(&mut self, defs: &[FieldDef], rows: usize, columns: &mut [ColumnData]) -> Result<()> {
        if defs.is_empty() {
            return Ok(());
        }
        for row in 0..rows {
            for (def, column) in defs.iter().zip(columns.iter_mut()) {
                let token = self.next_token(&def.name)?;
                push_token(column, def, Some(row), token)?;
            }
        }
        self.end_line();
        Ok(())
    }

    fn read_column_blocks(&mut self, defs: &[FieldDef], rows: usize, columns: &mut [ColumnData]) -> Result<()> {
        for (def, column) in defs.iter().zip(columns.iter_mut()) {
            for row in 0..rows {
                let token = self.next_token(&def.name)?;
                push_token(column, def, Some(row), token)?;
            }
            self.end_line();
        }
        Ok(())
    }

    /// One row per line until a blank line or end of stream
    fn read_rows_until_blank(&mut self, defs: &[FieldDef], columns: &mut [ColumnData]) -> Result<usize> {
        let mut rows = 0;
        while let Some(line) = self.next_line()? {
            if line.trim().is_empty() {
                break;
            }
            let mut tokens = Tokens::new(&line);
            for (def, column) in defs.iter().zip(columns.iter_mut()) {
                let token = tokens.next().ok_or_else(|| {
                    malformed(self.page, format!("row {rows} ends before column {}", def.name))
                })?;
                push_token(column, def, Some(rows), token)?;
            }
            rows += 1;
        }
        Ok(rows)
    }
}

fn parse_token(def: &FieldDef, row: Option<usize>, token: String) -> Result<Value> {
    if def.data_type.is_string() {
        return Ok(Value::String(token));
    }
    Value::parse(def.data_type, &token).ok_or(SddsError::BadNumericValue {
        field: def.name.clone(),
        row,
        token,
        data_type: def.data_type,
    })
}

fn push_token(data: &mut ColumnData, def: &FieldDef, row: Option<usize>, token: String) -> Result<()> {
    if let Some(strings) = data.strings_mut() {
        strings.push(token);
        return Ok(());
    }
    let value = parse_token(def, row, token)?;
    data.push(value);
    Ok(())
}

/// Decode one text page, `None` at end of stream
pub(crate) fn read_page<R: BufRead>(src: &mut R, layout: &Layout, ctx: &DecodeContext) -> Result<Option<Decoded>> {
    let mut reader = TextReader {
        src,
        page: ctx.page,
        lookahead: None,
        pending: VecDeque::new(),
        lossy: 0,
    };
    // Blank lines separate pages.
    match reader.next_content_line()? {
        Some(line) => reader.lookahead = Some(line),
        None => return Ok(None),
    }

    let mut parameters = Vec::with_capacity(layout.parameters().len());
    for def in layout.parameters() {
        let value = match fixed_parameter(def)? {
            Some(value) => value,
            None => reader.read_parameter(def)?,
        };
        parameters.push(value);
    }

    let arrays = layout
        .arrays()
        .iter()
        .map(|def| reader.read_array(def))
        .collect::<Result<Vec<_>>>()?;

    let mode = layout.data_mode();
    let defs = layout.columns();
    let declared_rows = if mode.no_row_counts {
        None
    } else {
        Some(reader.read_row_count()?)
    };
    let capacity = declared_rows.unwrap_or(0).min(PREALLOC_LIMIT);
    let mut columns: Vec<ColumnData> = defs
        .iter()
        .map(|d| ColumnData::with_capacity(d.data_type, capacity))
        .collect();

    let (outcome, rows) = match (declared_rows, mode.major_order) {
        (Some(rows), MajorOrder::Row) => (reader.read_rows(defs, rows, &mut columns), rows),
        (Some(rows), MajorOrder::Column) => (reader.read_column_blocks(defs, rows, &mut columns), rows),
        (None, MajorOrder::Row) => {
            let rows = reader.read_rows_until_blank(defs, &mut columns)?;
            (Ok(()), rows)
        }
        (None, MajorOrder::Column) => {
            return Err(malformed(
                ctx.page,
                "no_row_counts pages must be row-major".into(),
            ))
        }
    };
    let (columns, row_count, recovered) = settle_rows(columns, outcome, rows, ctx)?;
    log::trace!("text page {} decoded with {row_count} rows", ctx.page);

    Ok(Some(Decoded {
        body: PageBody {
            parameters,
            arrays,
            columns,
            row_count,
        },
        recovered,
        lossy_strings: reader.lossy,
    }))
}

fn field_format(def: &FieldDef) -> Option<PrintfFormat> {
    def.format_string
        .as_deref()
        .and_then(|f| PrintfFormat::parse(f).ok())
}

fn write_block<W: Write>(out: &mut W, data: &ColumnData, format: Option<&PrintfFormat>) -> Result<()> {
    let len = data.len();
    for i in 0..len {
        let token = data.format_token(i, format).unwrap_or_default();
        out.write_all(token.as_bytes())?;
        let line_end = (i + 1) % TOKENS_PER_LINE == 0 || i + 1 == len;
        out.write_all(if line_end { b"\n" } else { b" " })?;
    }
    Ok(())
}

/// Encode one page as text
pub(crate) fn write_page<W: Write>(out: &mut W, page: &Page) -> Result<()> {
    let layout = page.layout();
    let mode = layout.data_mode();
    writeln!(out, "! page number {}", page.page_number())?;

    for (def, value) in layout.parameters().iter().zip(page.parameter_values()) {
        if def.fixed_value.is_some() {
            continue;
        }
        let value = value.ok_or_else(|| SddsError::MissingParameter {
            name: def.name.clone(),
        })?;
        writeln!(out, "{}", format_token(value, field_format(def).as_ref()))?;
    }

    for (def, array) in layout.arrays().iter().zip(page.arrays()) {
        let dims: Vec<String> = array.dims.iter().map(u32::to_string).collect();
        writeln!(out, "{}", dims.join(" "))?;
        write_block(out, &array.data, field_format(def).as_ref())?;
    }

    let rows = page.row_count();
    if mode.no_row_counts && mode.major_order == MajorOrder::Column {
        return Err(malformed(
            page.page_number(),
            "no_row_counts pages must be row-major".into(),
        ));
    }
    if !mode.no_row_counts {
        writeln!(out, "{rows}")?;
    }

    let defs = layout.columns();
    let formats: Vec<Option<PrintfFormat>> = defs.iter().map(field_format).collect();
    let columns = page.columns_for_encoding();
    match mode.major_order {
        MajorOrder::Row if !columns.is_empty() => {
            let mut line = String::new();
            for row in 0..rows {
                line.clear();
                for (i, (column, format)) in columns.iter().zip(&formats).enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    line.push_str(&column.format_token(row, format.as_ref()).unwrap_or_default());
                }
                writeln!(out, "{line}")?;
            }
        }
        MajorOrder::Row => {}
        MajorOrder::Column => {
            for (column, format) in columns.iter().zip(&formats) {
                write_block(out, column, format.as_ref())?;
            }
        }
    }
    if mode.no_row_counts {
        writeln!(out)?;
    }
    Ok(())
}
