//! Binary page bodies
//!
//! Region order is fixed: non-fixed parameters, then each array as `u32`
//! dimensions followed by its elements, then the `u32` row count and the
//! column region in the layout's major order. Strings are a `u32` byte length
//! followed by the bytes without a terminator.
//!
//! Elements are read as host-order bytes and swapped afterwards, one column
//! per rayon task, when the file's byte order differs from the host.

use std::borrow::Cow;
use std::io::{self, BufRead, Read, Write};

use rayon::prelude::*;
use sdds_core::validation::{checked_element_count, validate_string_length};
use sdds_core::{ArrayData, ColumnData, DataType, FieldDef, Layout, MajorOrder, Result, SddsError, Value};

use super::{
    decode_utf8, fixed_parameter, malformed, settle_rows, truncated, DecodeContext, Decoded, PREALLOC_LIMIT,
};
use crate::page::{Page, PageBody};

struct BinaryReader<'a, R> {
    src: &'a mut R,
    swap: bool,
    page: u32,
    max_string_length: u64,
    lossy: usize,
}

impl<R: BufRead> BinaryReader<'_, R> {
    fn map_io(&self, err: io::Error, context: &str) -> SddsError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            truncated(self.page, context)
        } else {
            err.into()
        }
    }

    /// Exactly `len` bytes, without reserving `len` up front
    fn read_bytes(&mut self, len: usize, context: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        let result = (&mut *self.src).take(len as u64).read_to_end(&mut bytes);
        result.map_err(|e| self.map_io(e, context))?;
        if bytes.len() < len {
            return Err(truncated(self.page, context));
        }
        Ok(bytes)
    }

    fn read_u32(&mut self, context: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.src
            .read_exact(&mut buf)
            .map_err(|e| self.map_io(e, context))?;
        let value = u32::from_ne_bytes(buf);
        Ok(if self.swap { value.swap_bytes() } else { value })
    }

    fn read_string(&mut self, context: &str) -> Result<String> {
        let length = self.read_u32(context)?;
        let length = validate_string_length(u64::from(length), self.max_string_length)?;
        let bytes = self.read_bytes(length, context)?;
        Ok(decode_utf8(bytes, &mut self.lossy))
    }

    fn read_strings(&mut self, count: usize, context: &str) -> Result<ColumnData> {
        let mut out = Vec::with_capacity(count.min(PREALLOC_LIMIT));
        for _ in 0..count {
            out.push(self.read_string(context)?);
        }
        Ok(ColumnData::String(out))
    }

    /// `count` fixed-width elements in file byte order
    fn read_fixed(&mut self, data_type: DataType, count: usize, context: &str) -> Result<ColumnData> {
        let byte_len = count
            .checked_mul(data_type.size_bytes())
            .ok_or_else(|| malformed(self.page, format!("{context}: element count {count} overflows")))?;
        let bytes = self.read_bytes(byte_len, context)?;
        let mut data = ColumnData::zeroed(data_type, count);
        if let Some(dst) = data.fixed_bytes_mut() {
            dst.copy_from_slice(&bytes);
        }
        Ok(data)
    }

    fn read_elements(&mut self, def: &FieldDef, count: usize) -> Result<ColumnData> {
        if def.data_type.is_string() {
            self.read_strings(count, &def.name)
        } else {
            self.read_fixed(def.data_type, count, &def.name)
        }
    }

    fn read_value(&mut self, def: &FieldDef) -> Result<Value> {
        let mut data = self.read_elements(def, 1)?;
        if self.swap {
            data.swap_bytes();
        }
        Ok(data.get(0).unwrap_or_else(|| Value::default_for(def.data_type)))
    }

    fn read_array(&mut self, def: &FieldDef) -> Result<ArrayData> {
        let mut dims = Vec::with_capacity(def.dimensions as usize);
        for _ in 0..def.dimensions {
            dims.push(self.read_u32(&def.name)?);
        }
        let count = checked_element_count(&dims).ok_or_else(|| {
            malformed(self.page, format!("array {} dimensions {dims:?} overflow", def.name))
        })?;
        let mut data = self.read_elements(def, count)?;
        if self.swap {
            data.swap_bytes();
        }
        Ok(ArrayData { dims, data })
    }

    fn read_column_major(&mut self, defs: &[FieldDef], rows: usize, columns: &mut Vec<ColumnData>) -> Result<()> {
        for def in defs {
            match self.read_elements(def, rows) {
                Ok(data) => columns.push(data),
                Err(err) => {
                    columns.extend(
                        defs[columns.len()..]
                            .iter()
                            .map(|d| ColumnData::new(d.data_type)),
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn read_row_major(&mut self, defs: &[FieldDef], rows: usize, columns: &mut Vec<ColumnData>) -> Result<()> {
        if defs.iter().any(|d| d.data_type.is_string()) {
            return self.read_mixed_rows(defs, rows, columns);
        }

        let row_size: usize = defs.iter().map(|d| d.data_type.size_bytes()).sum();
        let byte_len = rows
            .checked_mul(row_size)
            .ok_or_else(|| malformed(self.page, format!("row count {rows} overflows")))?;
        let (bytes, outcome) = match self.read_bytes_partial(byte_len, "rows") {
            Ok(bytes) => (bytes, Ok(())),
            Err((bytes, err)) => (bytes, Err(err)),
        };
        let complete = if row_size == 0 { rows } else { bytes.len() / row_size };

        let mut offsets = Vec::with_capacity(defs.len());
        let mut offset = 0;
        for def in defs {
            offsets.push(offset);
            offset += def.data_type.size_bytes();
        }
        columns.extend(defs.iter().map(|d| ColumnData::zeroed(d.data_type, complete)));
        columns
            .par_iter_mut()
            .zip(offsets.par_iter())
            .for_each(|(column, &offset)| {
                let size = column.data_type().size_bytes();
                if let Some(dst) = column.fixed_bytes_mut() {
                    for (out, row) in dst.chunks_exact_mut(size).zip(bytes.chunks_exact(row_size)) {
                        out.copy_from_slice(&row[offset..offset + size]);
                    }
                }
            });
        outcome
    }

    /// Like [`Self::read_bytes`] but hands back what was read on truncation
    fn read_bytes_partial(&mut self, len: usize, context: &str) -> std::result::Result<Vec<u8>, (Vec<u8>, SddsError)> {
        let mut bytes = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        let result = (&mut *self.src).take(len as u64).read_to_end(&mut bytes);
        if let Err(err) = result {
            let err = self.map_io(err, context);
            return Err((bytes, err));
        }
        if bytes.len() < len {
            return Err((bytes, truncated(self.page, context)));
        }
        Ok(bytes)
    }

    fn read_mixed_rows(&mut self, defs: &[FieldDef], rows: usize, columns: &mut Vec<ColumnData>) -> Result<()> {
        columns.extend(
            defs.iter()
                .map(|d| ColumnData::with_capacity(d.data_type, rows.min(PREALLOC_LIMIT))),
        );
        for _ in 0..rows {
            for (def, column) in defs.iter().zip(columns.iter_mut()) {
                if def.data_type.is_string() {
                    let text = self.read_string(&def.name)?;
                    if let Some(strings) = column.strings_mut() {
                        strings.push(text);
                    }
                } else {
                    let element = self.read_fixed(def.data_type, 1, &def.name)?;
                    if let Some(value) = element.get(0) {
                        column.push(value);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Decode one binary page, `None` at a clean end of stream
pub(crate) fn read_page<R: BufRead>(src: &mut R, layout: &Layout, ctx: &DecodeContext) -> Result<Option<Decoded>> {
    if src.fill_buf()?.is_empty() {
        return Ok(None);
    }
    let mode = layout.data_mode();
    let mut reader = BinaryReader {
        src,
        swap: mode.needs_swap(),
        page: ctx.page,
        max_string_length: ctx.max_string_length,
        lossy: 0,
    };

    let mut parameters = Vec::with_capacity(layout.parameters().len());
    for def in layout.parameters() {
        let value = match fixed_parameter(def)? {
            Some(value) => value,
            None => reader.read_value(def)?,
        };
        parameters.push(value);
    }

    let arrays = layout
        .arrays()
        .iter()
        .map(|def| reader.read_array(def))
        .collect::<Result<Vec<_>>>()?;

    let declared_rows = reader.read_u32("row count")? as usize;
    let defs = layout.columns();
    let mut columns = Vec::with_capacity(defs.len());
    let outcome = match mode.major_order {
        MajorOrder::Column => reader.read_column_major(defs, declared_rows, &mut columns),
        MajorOrder::Row => reader.read_row_major(defs, declared_rows, &mut columns),
    };
    let (mut columns, row_count, recovered) = settle_rows(columns, outcome, declared_rows, ctx)?;

    if reader.swap {
        columns.par_iter_mut().for_each(ColumnData::swap_bytes);
    }
    log::trace!("binary page {} decoded with {row_count} rows", ctx.page);

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

struct BinaryWriter<'a, W> {
    out: &'a mut W,
    swap: bool,
}

impl<W: Write> BinaryWriter<'_, W> {
    fn write_u32(&mut self, value: u32) -> Result<()> {
        let value = if self.swap { value.swap_bytes() } else { value };
        self.out.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, text: &str) -> Result<()> {
        let length = u32::try_from(text.len()).map_err(|_| SddsError::StringTooLong {
            length: text.len() as u64,
            limit: u64::from(u32::MAX),
        })?;
        self.write_u32(length)?;
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Buffer converted to file byte order
    fn in_file_order<'d>(&self, data: &'d ColumnData) -> Cow<'d, ColumnData> {
        if self.swap && data.data_type().size_bytes() > 1 && !data.data_type().is_string() {
            let mut swapped = data.clone();
            swapped.swap_bytes();
            Cow::Owned(swapped)
        } else {
            Cow::Borrowed(data)
        }
    }

    fn write_data(&mut self, data: &ColumnData) -> Result<()> {
        if let Some(strings) = data.strings() {
            for text in strings {
                self.write_string(text)?;
            }
            return Ok(());
        }
        let data = self.in_file_order(data);
        if let Some(bytes) = data.fixed_bytes() {
            self.out.write_all(bytes)?;
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(text) => self.write_string(text),
            other => self.write_data(&ColumnData::from_value(other.clone())),
        }
    }

    fn write_rows(&mut self, columns: &[Cow<'_, ColumnData>], rows: usize) -> Result<()> {
        let prepared: Vec<Cow<'_, ColumnData>> = columns.iter().map(|c| self.in_file_order(c)).collect();

        if prepared.iter().all(|c| !c.data_type().is_string()) {
            let row_size: usize = prepared.iter().map(|c| c.data_type().size_bytes()).sum();
            if row_size == 0 {
                return Ok(());
            }
            let mut buffer = vec![0u8; rows * row_size];
            let mut offset = 0;
            for column in &prepared {
                let size = column.data_type().size_bytes();
                if let Some(bytes) = column.fixed_bytes() {
                    for (row, element) in buffer.chunks_exact_mut(row_size).zip(bytes.chunks_exact(size)) {
                        row[offset..offset + size].copy_from_slice(element);
                    }
                }
                offset += size;
            }
            self.out.write_all(&buffer)?;
            return Ok(());
        }

        for row in 0..rows {
            for column in &prepared {
                match column.strings() {
                    Some(strings) => self.write_string(&strings[row])?,
                    None => {
                        let size = column.data_type().size_bytes();
                        if let Some(bytes) = column.fixed_bytes() {
                            self.out.write_all(&bytes[row * size..(row + 1) * size])?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Encode one page in its layout's byte order and major order
pub(crate) fn write_page<W: Write>(out: &mut W, page: &Page) -> Result<()> {
    let layout = page.layout();
    let mode = layout.data_mode();
    let mut writer = BinaryWriter {
        out,
        swap: mode.needs_swap(),
    };

    for (def, value) in layout.parameters().iter().zip(page.parameter_values()) {
        if def.fixed_value.is_some() {
            continue;
        }
        let value = value.ok_or_else(|| SddsError::MissingParameter {
            name: def.name.clone(),
        })?;
        writer.write_value(value)?;
    }

    for array in page.arrays() {
        for &dim in &array.dims {
            writer.write_u32(dim)?;
        }
        writer.write_data(&array.data)?;
    }

    let rows = page.row_count();
    let declared = u32::try_from(rows)
        .map_err(|_| malformed(page.page_number(), format!("{rows} rows exceed the binary row count")))?;
    writer.write_u32(declared)?;

    let columns = page.columns_for_encoding();
    match mode.major_order {
        MajorOrder::Column => {
            for column in &columns {
                writer.write_data(column)?;
            }
        }
        MajorOrder::Row => writer.write_rows(&columns, rows)?,
    }
    Ok(())
}
