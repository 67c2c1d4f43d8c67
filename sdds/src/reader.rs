//! Reading handle
//!
//! [`SddsReader`] walks `HeaderPending → LayoutLoaded → PageLoaded →
//! Terminated`. Every error a method returns is also pushed onto the
//! handle's [`ErrorStack`]; after a fatal error the handle only accepts
//! [`SddsReader::terminate`].

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use sdds_core::{
    ColumnData, Element, ErrorStack, FieldKind, HeaderParser, HeaderProgress, Layout, Result,
    SddsError, Severity, TypeFilter, Value,
};

use crate::codec::{self, DecodeContext};
use crate::options::{ReaderOptions, TerminateMode};
use crate::page::Page;
use crate::source::Source;

/// Position of a reader in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    HeaderPending,
    LayoutLoaded,
    PageLoaded,
    Terminated,
}

impl ReaderState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReaderState::HeaderPending => "waiting for the header",
            ReaderState::LayoutLoaded => "holding a layout",
            ReaderState::PageLoaded => "holding a page",
            ReaderState::Terminated => "terminated",
        }
    }
}

/// Streaming reader over one dataset
#[derive(Debug)]
pub struct SddsReader<R = Source> {
    source: Option<R>,
    options: ReaderOptions,
    layout: Arc<Layout>,
    page: Page,
    state: ReaderState,
    pages_read: u32,
    exhausted: bool,
    failed: bool,
    errors: ErrorStack,
}

impl SddsReader<Source> {
    /// Open a file; the header is read by [`Self::read_layout`] or the first
    /// [`Self::read_page`]
    pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let source = Source::open(path.as_ref(), options.use_mmap)?;
        log::debug!("opened {} for reading", path.as_ref().display());
        Ok(Self::from_reader(source, options))
    }

    pub fn from_stdin(options: ReaderOptions) -> Self {
        Self::from_reader(Source::stdin(), options)
    }
}

impl<R: BufRead> SddsReader<R> {
    pub fn from_reader(source: R, options: ReaderOptions) -> Self {
        let mut errors = ErrorStack::new();
        errors.suppress_warnings(options.no_warnings);
        let layout = Arc::new(Layout::new());
        Self {
            source: Some(source),
            options,
            page: Page::new(layout.clone()),
            layout,
            state: ReaderState::HeaderPending,
            pages_read: 0,
            exhausted: false,
            failed: false,
            errors,
        }
    }

    fn record(&mut self, err: SddsError) -> SddsError {
        self.errors.push(&err);
        err
    }

    /// Record a decoding failure; a fatal one drains the handle
    fn record_stream(&mut self, err: SddsError) -> SddsError {
        if err.is_fatal() {
            self.failed = true;
        }
        self.record(err)
    }

    fn invalid_state(&mut self, operation: &'static str) -> SddsError {
        let state = if self.failed {
            "failed"
        } else {
            self.state.as_str()
        };
        self.record(SddsError::InvalidState { operation, state })
    }

    /// Parse the header if it has not been read yet
    pub fn read_layout(&mut self) -> Result<&Layout> {
        match self.state {
            ReaderState::HeaderPending if !self.failed => {}
            ReaderState::HeaderPending | ReaderState::Terminated => {
                return Err(self.invalid_state("read_layout"))
            }
            _ => return Ok(&self.layout),
        }
        let outcome = self.load_header();
        match outcome {
            Ok(()) => Ok(&self.layout),
            Err(err) => Err(self.record_stream(err)),
        }
    }

    fn load_header(&mut self) -> Result<()> {
        let source = self.source.as_mut().ok_or(SddsError::InvalidState {
            operation: "read_layout",
            state: "closed",
        })?;
        let mut parser = HeaderParser::new().allow_any_name(self.options.allow_any_name);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if source.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if matches!(parser.feed_line(&line)?, HeaderProgress::Complete) {
                break;
            }
        }
        let version = parser.version();
        let warnings = parser.take_warnings();
        let mut layout = parser.finish()?;

        let mode = *layout.data_mode();
        if !mode.is_binary() {
            for _ in 0..mode.additional_header_lines {
                buf.clear();
                if source.read_until(b'\n', &mut buf)? == 0 {
                    break;
                }
            }
        }
        for warning in &warnings {
            self.errors.push(warning);
        }

        layout.freeze();
        log::debug!(
            "loaded SDDS{} layout: {} parameters, {} arrays, {} columns, {:?} {:?}",
            version.unwrap_or_default(),
            layout.parameters().len(),
            layout.arrays().len(),
            layout.columns().len(),
            mode.encoding,
            mode.major_order,
        );
        self.layout = Arc::new(layout);
        self.page = Page::new(self.layout.clone());
        self.state = ReaderState::LayoutLoaded;
        Ok(())
    }

    /// Decode the next page and return its 1-based number
    ///
    /// Returns `Ok(None)` at end of stream, and keeps returning it on later
    /// calls. The previous page is replaced.
    pub fn read_page(&mut self) -> Result<Option<u32>> {
        if self.failed || self.state == ReaderState::Terminated {
            return Err(self.invalid_state("read_page"));
        }
        if self.state == ReaderState::HeaderPending {
            self.read_layout()?;
        }
        if self.exhausted {
            return Ok(None);
        }

        let ctx = DecodeContext {
            page: self.pages_read + 1,
            max_string_length: self.options.max_string_length,
            auto_recover: self.options.auto_recover,
        };
        let Some(source) = self.source.as_mut() else {
            return Err(self.invalid_state("read_page"));
        };
        match codec::read_page(source, &self.layout, &ctx) {
            Ok(Some(decoded)) => {
                self.pages_read = ctx.page;
                self.page = Page::from_body(self.layout.clone(), ctx.page, decoded.body);
                self.state = ReaderState::PageLoaded;
                if decoded.recovered {
                    self.exhausted = true;
                    let message = format!(
                        "page {} is truncated; kept {} complete rows",
                        ctx.page,
                        self.page.row_count()
                    );
                    self.errors.set_error(Severity::Warning, &message);
                }
                if decoded.lossy_strings > 0 {
                    let message = format!(
                        "page {}: replaced invalid UTF-8 in {} strings",
                        ctx.page, decoded.lossy_strings
                    );
                    self.errors.set_error(Severity::Warning, &message);
                }
                log::debug!("read page {} with {} rows", ctx.page, self.page.row_count());
                Ok(Some(ctx.page))
            }
            Ok(None) => {
                log::debug!("end of data after {} pages", self.pages_read);
                self.exhausted = true;
                Ok(None)
            }
            Err(err) => Err(self.record_stream(err)),
        }
    }

    /// The file's layout; empty until the header is read
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn shared_layout(&self) -> Arc<Layout> {
        self.layout.clone()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Number of pages decoded so far
    pub fn pages_read(&self) -> u32 {
        self.pages_read
    }

    /// The current page; empty before the first `read_page`
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn errors(&self) -> &ErrorStack {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorStack {
        &mut self.errors
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Typed view of a column of the current page
    pub fn column<T: Element>(&mut self, name: &str) -> Result<&[T]> {
        let outcome = self.page.column::<T>(name).map(|_| ());
        if let Err(err) = outcome {
            return Err(self.record(err));
        }
        self.page.column::<T>(name)
    }

    /// Owned copy of a column of the current page
    pub fn get_column(&mut self, name: &str) -> Result<ColumnData> {
        let outcome = self.page.get_column(name);
        outcome.map_err(|err| self.record(err))
    }

    pub fn parameter(&mut self, name: &str) -> Result<Value> {
        let outcome = self.page.parameter(name).cloned();
        outcome.map_err(|err| self.record(err))
    }

    /// Check that a column exists with an acceptable type
    ///
    /// A units mismatch only pushes a warning.
    pub fn check_column(&mut self, name: &str, units: Option<&str>, filter: TypeFilter) -> Result<()> {
        self.check_field(FieldKind::Column, name, units, filter)
    }

    pub fn check_parameter(&mut self, name: &str, units: Option<&str>, filter: TypeFilter) -> Result<()> {
        self.check_field(FieldKind::Parameter, name, units, filter)
    }

    pub fn check_array(&mut self, name: &str, units: Option<&str>, filter: TypeFilter) -> Result<()> {
        self.check_field(FieldKind::Array, name, units, filter)
    }

    fn check_field(&mut self, kind: FieldKind, name: &str, units: Option<&str>, filter: TypeFilter) -> Result<()> {
        let found = self
            .layout
            .field_by_name(kind, name)
            .map(|def| (def.data_type, def.units.clone()));
        let Some((data_type, declared)) = found else {
            return Err(self.record(SddsError::NameNotFound {
                kind,
                name: name.into(),
            }));
        };
        if !filter.accepts(data_type) {
            return Err(self.record(SddsError::WrongType {
                name: name.into(),
                expected: filter.to_string(),
                actual: data_type,
            }));
        }
        if let Some(expected) = units {
            let declared = declared.unwrap_or_default();
            if declared != expected {
                self.errors.push(&SddsError::UnitsMismatch {
                    name: name.into(),
                    expected: expected.into(),
                    found: declared,
                });
            }
        }
        Ok(())
    }

    /// Close the handle; later calls are no-ops
    ///
    /// With [`TerminateMode::RetainPage`] the last page read is returned so
    /// its buffers outlive the handle.
    pub fn terminate(&mut self, mode: TerminateMode) -> Result<Option<Page>> {
        if self.state == ReaderState::Terminated {
            return Ok(None);
        }
        self.state = ReaderState::Terminated;
        self.source = None;
        let page = std::mem::replace(&mut self.page, Page::new(self.layout.clone()));
        log::debug!("reader terminated after {} pages", self.pages_read);
        Ok(match mode {
            TerminateMode::RetainPage if page.page_number() > 0 => Some(page),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdds_core::{DataType, ErrorKind};
    use std::io::Cursor;

    const TEXT: &str = "SDDS5\n\
        &parameter name=label, type=string, &end\n\
        &column name=x, type=double, units=m, &end\n\
        &column name=n, type=long, &end\n\
        &colour name=q &end\n";

    fn reader(text: &str) -> SddsReader<Cursor<Vec<u8>>> {
        SddsReader::from_reader(Cursor::new(text.as_bytes().to_vec()), ReaderOptions::default())
    }

    #[test]
    fn test_unknown_directive_is_fatal() {
        let mut reader = reader(TEXT);
        let err = reader.read_layout().unwrap_err();
        assert!(matches!(err, SddsError::UnknownDirective { in_header: true, .. }));
        assert!(reader.errors().has_fatal());
        assert!(matches!(
            reader.read_page(),
            Err(SddsError::InvalidState { .. })
        ));
        assert!(reader.terminate(TerminateMode::Release).unwrap().is_none());
    }

    #[test]
    fn test_read_pages_then_end() {
        let text = "SDDS5\n\
            &parameter name=label, type=string, &end\n\
            &column name=x, type=double, units=m, &end\n\
            &data mode=ascii, &end\n\
            first\n2\n1.5\n2.5\n\
            second\n0\n";
        let mut reader = reader(text);
        assert_eq!(reader.state(), ReaderState::HeaderPending);
        assert_eq!(reader.read_page().unwrap(), Some(1));
        assert_eq!(reader.column::<f64>("x").unwrap(), [1.5, 2.5]);
        assert_eq!(reader.read_page().unwrap(), Some(2));
        assert_eq!(reader.page().row_count(), 0);
        assert_eq!(reader.parameter("label").unwrap(), Value::String("second".into()));
        assert_eq!(reader.read_page().unwrap(), None);
        assert_eq!(reader.read_page().unwrap(), None);
        assert_eq!(reader.pages_read(), 2);

        let page = reader.terminate(TerminateMode::RetainPage).unwrap().unwrap();
        assert_eq!(page.page_number(), 2);
        assert!(reader.terminate(TerminateMode::RetainPage).unwrap().is_none());
        assert!(matches!(
            reader.read_page(),
            Err(SddsError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_check_column() {
        let text = "SDDS5\n&column name=x, type=double, units=m, &end\n&data mode=ascii, &end\n";
        let mut reader = reader(text);
        reader.read_layout().unwrap();
        reader.check_column("x", Some("m"), TypeFilter::Float).unwrap();
        assert!(reader.errors().is_empty());

        reader.check_column("x", Some("s"), TypeFilter::Numeric).unwrap();
        assert_eq!(
            reader.errors().top().map(|f| f.kind),
            Some(ErrorKind::UnitsMismatch)
        );

        let err = reader
            .check_column("x", None, TypeFilter::Exact(DataType::I32))
            .unwrap_err();
        assert!(matches!(err, SddsError::WrongType { .. }));
        let err = reader.check_column("y", None, TypeFilter::Any).unwrap_err();
        assert!(matches!(err, SddsError::NameNotFound { .. }));
        // Recoverable errors leave the handle usable.
        assert_eq!(reader.read_page().unwrap(), None);
    }

    #[test]
    fn test_additional_header_lines() {
        let text = "SDDS5\n&column name=x, type=short, &end\n\
            &data mode=ascii, additional_header_lines=2, &end\n\
            junk one\njunk two\n1\n7\n";
        let mut reader = reader(text);
        assert_eq!(reader.read_page().unwrap(), Some(1));
        assert_eq!(reader.column::<i16>("x").unwrap(), [7]);
    }
}
