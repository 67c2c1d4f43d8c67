//! Page body codecs
//!
//! [`binary`] and [`text`] encode and decode everything that follows the
//! header, one page per call. Fixed-value parameters never appear in page
//! bodies; both decoders fill them in from the layout.

pub mod binary;
pub mod text;

use std::io::{BufRead, Write};

use sdds_core::{ColumnData, FieldDef, Layout, Result, SddsError, Value};

use crate::page::{Page, PageBody};

/// Upper bound on buffer capacity reserved from a declared count
///
/// Counts come from the file and may be corrupt; buffers grow past this as
/// elements actually arrive.
pub(crate) const PREALLOC_LIMIT: usize = 1 << 16;

/// Per-page decoding settings
#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodeContext {
    /// 1-based number of the page being decoded
    pub page: u32,
    pub max_string_length: u64,
    pub auto_recover: bool,
}

#[derive(Debug)]
pub(crate) struct Decoded {
    pub body: PageBody,
    /// The page was truncated and only its complete rows were kept
    pub recovered: bool,
    /// Strings or text lines whose invalid UTF-8 was replaced
    pub lossy_strings: usize,
}

/// Decode `bytes` as UTF-8, replacing invalid sequences and counting them
pub(crate) fn decode_utf8(bytes: Vec<u8>, lossy: &mut usize) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            *lossy += 1;
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

/// Decode the next page, `None` at a clean end of stream
pub(crate) fn read_page<R: BufRead>(src: &mut R, layout: &Layout, ctx: &DecodeContext) -> Result<Option<Decoded>> {
    if layout.data_mode().is_binary() {
        binary::read_page(src, layout, ctx)
    } else {
        text::read_page(src, layout, ctx)
    }
}

/// Encode `page` under its layout's data mode
pub(crate) fn write_page<W: Write>(out: &mut W, page: &Page) -> Result<()> {
    if page.layout().data_mode().is_binary() {
        binary::write_page(out, page)
    } else {
        text::write_page(out, page)
    }
}

pub(crate) fn fixed_parameter(def: &FieldDef) -> Result<Option<Value>> {
    def.parsed_fixed_value().transpose()
}

pub(crate) fn truncated(page: u32, context: &str) -> SddsError {
    SddsError::Truncated {
        page,
        context: context.into(),
    }
}

pub(crate) fn malformed(page: u32, reason: String) -> SddsError {
    SddsError::MalformedPage { page, reason }
}

/// Resolve the outcome of decoding the column region
///
/// On truncation with `auto_recover` set, every column is cut back to the
/// rows that were read completely and the page is kept.
pub(crate) fn settle_rows(
    mut columns: Vec<ColumnData>,
    outcome: Result<()>,
    declared_rows: usize,
    ctx: &DecodeContext,
) -> Result<(Vec<ColumnData>, usize, bool)> {
    match outcome {
        Ok(()) => Ok((columns, declared_rows, false)),
        Err(err @ SddsError::Truncated { .. }) if ctx.auto_recover => {
            let rows = columns.iter().map(ColumnData::len).min().unwrap_or(0);
            columns.iter_mut().for_each(|c| c.truncate(rows));
            log::warn!("page {} truncated, keeping {rows} complete rows: {err}", ctx.page);
            Ok((columns, rows, true))
        }
        Err(err) => Err(err),
    }
}
