//! Writing handle
//!
//! [`SddsWriter`] walks `Configuring → LayoutWritten → PageOpen →
//! PageClosed`, re-entering `PageOpen` on each `start_page`. Definitions are
//! only accepted while configuring; writing the layout freezes them.

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;
use std::sync::Arc;

use sdds_core::{
    AssociateDef, ColumnData, DataType, ErrorStack, FieldDef, FieldKind, Layout, MajorOrder, Result,
    SddsError, Severity, Value,
};

use crate::codec;
use crate::options::{TerminateMode, WriterOptions};
use crate::page::Page;

/// Position of a writer in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Configuring,
    LayoutWritten,
    PageOpen,
    PageClosed,
    Terminated,
}

impl WriterState {
    pub fn as_str(self) -> &'static str {
        match self {
            WriterState::Configuring => "configuring",
            WriterState::LayoutWritten => "past its header",
            WriterState::PageOpen => "holding an open page",
            WriterState::PageClosed => "between pages",
            WriterState::Terminated => "terminated",
        }
    }
}

/// Which parts of a source layout [`SddsWriter::initialize_copy`] transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyDefinitions {
    pub description: bool,
    pub parameters: bool,
    pub arrays: bool,
    pub columns: bool,
    pub associates: bool,
}

impl CopyDefinitions {
    pub const ALL: CopyDefinitions = CopyDefinitions {
        description: true,
        parameters: true,
        arrays: true,
        columns: true,
        associates: true,
    };

    pub const NONE: CopyDefinitions = CopyDefinitions {
        description: false,
        parameters: false,
        arrays: false,
        columns: false,
        associates: false,
    };

    /// Everything except columns, which the caller transfers selectively
    pub const WITHOUT_COLUMNS: CopyDefinitions = CopyDefinitions {
        columns: false,
        ..CopyDefinitions::ALL
    };
}

impl Default for CopyDefinitions {
    fn default() -> Self {
        Self::ALL
    }
}

/// Streaming writer for one dataset
#[derive(Debug)]
pub struct SddsWriter<W: Write = BufWriter<File>> {
    sink: Option<W>,
    options: WriterOptions,
    layout: Arc<Layout>,
    page: Option<Page>,
    state: WriterState,
    pages_written: u32,
    failed: bool,
    errors: ErrorStack,
}

impl SddsWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        log::debug!("created {} for writing", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file), options))
    }
}

impl SddsWriter<BufWriter<Stdout>> {
    pub fn to_stdout(options: WriterOptions) -> Self {
        Self::new(BufWriter::new(io::stdout()), options)
    }
}

impl<W: Write> SddsWriter<W> {
    pub fn new(sink: W, options: WriterOptions) -> Self {
        let mut errors = ErrorStack::new();
        errors.suppress_warnings(options.no_warnings);
        let layout = Layout::with_description(options.description.as_deref(), options.contents.as_deref());
        Self {
            sink: Some(sink),
            options,
            layout: Arc::new(layout),
            page: None,
            state: WriterState::Configuring,
            pages_written: 0,
            failed: false,
            errors,
        }
    }

    fn record(&mut self, err: SddsError) -> SddsError {
        self.errors.push(&err);
        err
    }

    fn tracked<T>(&mut self, outcome: Result<T>) -> Result<T> {
        outcome.map_err(|err| self.record(err))
    }

    /// Like [`Self::tracked`] for failures while emitting bytes; a fatal one
    /// leaves the output unusable, so the handle refuses further writes
    fn tracked_stream<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(err) = &outcome {
            if err.is_fatal() {
                self.failed = true;
            }
        }
        self.tracked(outcome)
    }

    fn invalid_state(&mut self, operation: &'static str) -> SddsError {
        let state = if self.failed {
            "failed"
        } else {
            self.state.as_str()
        };
        self.record(SddsError::InvalidState { operation, state })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn errors(&self) -> &ErrorStack {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorStack {
        &mut self.errors
    }

    // Layout configuration

    /// Mutable layout; fails with `AlreadyWritten` once the header is out
    pub fn layout_mut(&mut self) -> Result<&mut Layout> {
        if self.state != WriterState::Configuring {
            return Err(self.record(SddsError::AlreadyWritten));
        }
        Ok(Arc::make_mut(&mut self.layout))
    }

    pub fn define(&mut self, def: FieldDef) -> Result<usize> {
        let outcome = self.layout_mut()?.define(def);
        self.tracked(outcome)
    }

    pub fn define_column(&mut self, name: &str, data_type: DataType) -> Result<usize> {
        self.define(FieldDef::column(name, data_type))
    }

    pub fn define_parameter(&mut self, name: &str, data_type: DataType) -> Result<usize> {
        self.define(FieldDef::parameter(name, data_type))
    }

    pub fn define_array(&mut self, name: &str, data_type: DataType, dimensions: u32) -> Result<usize> {
        self.define(FieldDef::array(name, data_type, dimensions))
    }

    pub fn define_associate(&mut self, associate: AssociateDef) -> Result<usize> {
        let outcome = self.layout_mut()?.define_associate(associate);
        self.tracked(outcome)
    }

    /// Define a field from a `&column ... &end` style directive
    pub fn define_from_text(&mut self, text: &str) -> Result<usize> {
        let outcome = self.layout_mut()?.define_from_text(text);
        self.tracked(outcome)
    }

    pub fn set_description(&mut self, description: Option<&str>, contents: Option<&str>) -> Result<()> {
        let outcome = self.layout_mut()?.set_description(description, contents);
        self.tracked(outcome)
    }

    /// Copy one definition from another layout, optionally renamed
    pub fn transfer_definition(
        &mut self,
        src: &Layout,
        kind: FieldKind,
        name: &str,
        rename: Option<&str>,
    ) -> Result<usize> {
        let outcome = self.layout_mut()?.transfer_definition(src, kind, name, rename);
        self.tracked(outcome)
    }

    /// Start this layout "like" `src`, transferring the selected parts
    pub fn initialize_copy(&mut self, src: &Layout, copy: CopyDefinitions) -> Result<()> {
        let outcome = copy_layout(self.layout_mut()?, src, copy);
        self.tracked(outcome)
    }

    /// Emit the header and freeze the layout
    pub fn write_layout(&mut self) -> Result<()> {
        match self.state {
            WriterState::Configuring if !self.failed => {}
            WriterState::Configuring | WriterState::Terminated => {
                return Err(self.invalid_state("write_layout"))
            }
            _ => return Err(self.record(SddsError::AlreadyWritten)),
        }
        let outcome = self.emit_header();
        self.tracked_stream(outcome)
    }

    fn emit_header(&mut self) -> Result<()> {
        let mode = self.options.resolved_data_mode();
        if !mode.is_binary() && mode.no_row_counts && mode.major_order == MajorOrder::Column {
            return Err(SddsError::Message {
                severity: Severity::Recoverable,
                message: "no_row_counts requires row-major order".into(),
            });
        }
        let layout = Arc::make_mut(&mut self.layout);
        layout.set_data_mode(mode)?;
        layout.freeze();

        let mut header = String::new();
        sdds_core::write_header(&self.layout, &mut header).map_err(|_| SddsError::MalformedHeader {
            line: 0,
            reason: "header could not be formatted".into(),
        })?;
        let sink = self.sink.as_mut().ok_or(SddsError::InvalidState {
            operation: "write_layout",
            state: "closed",
        })?;
        sink.write_all(header.as_bytes())?;
        self.state = WriterState::LayoutWritten;
        log::debug!(
            "wrote layout: {} parameters, {} arrays, {} columns, {:?} {:?} {:?}",
            self.layout.parameters().len(),
            self.layout.arrays().len(),
            self.layout.columns().len(),
            mode.encoding,
            mode.major_order,
            mode.endianness,
        );
        Ok(())
    }

    // Pages

    /// Open a fresh page, writing the header first if needed
    ///
    /// `row_count` commits the page's row count up front; with `None` the
    /// first column set commits it. An unwritten open page is discarded.
    pub fn start_page(&mut self, row_count: Option<usize>) -> Result<&mut Page> {
        match self.state {
            _ if self.failed => return Err(self.invalid_state("start_page")),
            WriterState::Configuring => self.write_layout()?,
            WriterState::LayoutWritten | WriterState::PageClosed => {}
            WriterState::PageOpen => {
                log::debug!("discarding unwritten page {}", self.pages_written + 1);
            }
            WriterState::Terminated => return Err(self.invalid_state("start_page")),
        }
        let mut page = Page::new(self.layout.clone());
        page.set_page_number(self.pages_written + 1);
        if let Some(rows) = row_count {
            let outcome = page.set_row_count(rows);
            self.tracked(outcome)?;
        }
        self.state = WriterState::PageOpen;
        Ok(self.page.insert(page))
    }

    /// The open page
    pub fn page_mut(&mut self) -> Result<&mut Page> {
        if self.state != WriterState::PageOpen || self.page.is_none() {
            return Err(self.invalid_state("page_mut"));
        }
        self.page.as_mut().ok_or(SddsError::InvalidState {
            operation: "page_mut",
            state: "without a page",
        })
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let outcome = self.page_mut()?.set_parameter(name, value);
        self.tracked(outcome)
    }

    pub fn set_array(&mut self, name: &str, dims: &[u32], data: impl Into<ColumnData>) -> Result<()> {
        let outcome = self.page_mut()?.set_array(name, dims, data);
        self.tracked(outcome)
    }

    pub fn set_column(&mut self, name: &str, data: impl Into<ColumnData>) -> Result<()> {
        let outcome = self.page_mut()?.set_column(name, data);
        self.tracked(outcome)
    }

    /// Copy every field with a matching name from `src` into the open page
    pub fn copy_page_from(&mut self, src: &Page) -> Result<()> {
        let outcome = self.page_mut()?.copy_from(src);
        self.tracked(outcome)
    }

    pub fn copy_parameters_from(&mut self, src: &Page) -> Result<()> {
        let outcome = self.page_mut()?.copy_parameters_from(src);
        self.tracked(outcome)
    }

    /// Encode the open page
    ///
    /// Every row is written regardless of the page's row mask.
    pub fn write_page(&mut self) -> Result<()> {
        if self.failed || self.state != WriterState::PageOpen {
            return Err(self.invalid_state("write_page"));
        }
        let validation = self.page.as_ref().map_or(Ok(()), Page::validate_for_write);
        self.tracked(validation)?;
        let outcome = self.encode_page();
        self.tracked_stream(outcome)
    }

    fn encode_page(&mut self) -> Result<()> {
        let page = self.page.as_ref().ok_or(SddsError::InvalidState {
            operation: "write_page",
            state: "without a page",
        })?;
        let sink = self.sink.as_mut().ok_or(SddsError::InvalidState {
            operation: "write_page",
            state: "closed",
        })?;
        codec::write_page(sink, page)?;
        log::debug!("wrote page {} with {} rows", page.page_number(), page.row_count());
        self.pages_written += 1;
        self.state = WriterState::PageClosed;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let outcome = match self.sink.as_mut() {
            Some(sink) => sink.flush().map_err(SddsError::from),
            None => Ok(()),
        };
        self.tracked_stream(outcome)
    }

    /// Finish the dataset; later calls are no-ops
    ///
    /// A writer that never wrote its layout writes it now, so the output is a
    /// valid dataset without pages. An open page that was not written is
    /// dropped. With [`TerminateMode::RetainPage`] the last page is returned.
    pub fn terminate(&mut self, mode: TerminateMode) -> Result<Option<Page>> {
        if self.state == WriterState::Terminated {
            return Ok(None);
        }
        let mut outcome = Ok(());
        if self.state == WriterState::Configuring && !self.failed {
            outcome = self.write_layout();
        }
        if self.state == WriterState::PageOpen {
            log::warn!("terminating with unwritten page {}", self.pages_written + 1);
        }
        if outcome.is_ok() {
            outcome = self.flush();
        }
        self.state = WriterState::Terminated;
        let page = self.page.take();
        log::debug!("writer terminated after {} pages", self.pages_written);
        outcome?;
        Ok(match mode {
            TerminateMode::RetainPage => page,
            TerminateMode::Release => None,
        })
    }

    /// Terminate and hand back the sink
    pub fn into_inner(mut self) -> Result<W> {
        self.terminate(TerminateMode::Release)?;
        self.sink.take().ok_or(SddsError::InvalidState {
            operation: "into_inner",
            state: "closed",
        })
    }
}

fn copy_layout(layout: &mut Layout, src: &Layout, copy: CopyDefinitions) -> Result<()> {
    if copy.description {
        layout.set_description(src.description(), src.contents())?;
    }
    let kinds = [
        (copy.parameters, FieldKind::Parameter),
        (copy.arrays, FieldKind::Array),
        (copy.columns, FieldKind::Column),
    ];
    for (wanted, kind) in kinds {
        if wanted {
            layout.transfer_all(src, kind)?;
        }
    }
    if copy.associates {
        for associate in src.associates() {
            layout.define_associate(associate.clone())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> SddsWriter<Vec<u8>> {
        SddsWriter::new(Vec::new(), WriterOptions::ascii())
    }

    #[test]
    fn test_state_machine() {
        let mut w = writer();
        assert_eq!(w.state(), WriterState::Configuring);
        w.define_column("x", DataType::F64).unwrap();
        assert!(matches!(
            w.define_column("x", DataType::F32),
            Err(SddsError::DuplicateName { .. })
        ));
        assert!(matches!(w.write_page(), Err(SddsError::InvalidState { .. })));

        w.write_layout().unwrap();
        assert!(matches!(
            w.define_column("y", DataType::F64),
            Err(SddsError::AlreadyWritten)
        ));
        assert!(matches!(w.write_layout(), Err(SddsError::AlreadyWritten)));

        w.start_page(None).unwrap();
        w.set_column("x", vec![1.0, 2.0]).unwrap();
        w.write_page().unwrap();
        assert_eq!(w.state(), WriterState::PageClosed);
        assert!(matches!(w.set_column("x", vec![1.0]), Err(SddsError::InvalidState { .. })));
        assert!(w.errors().len() >= 4);

        let bytes = w.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("SDDS5\n"));
        assert!(text.ends_with("2\n1.0\n2.0\n"));
    }

    #[test]
    fn test_column_not_set() {
        let mut w = writer();
        w.define_column("x", DataType::F64).unwrap();
        w.define_column("y", DataType::F64).unwrap();
        w.start_page(Some(2)).unwrap();
        w.set_column("x", vec![1.0, 2.0]).unwrap();
        assert!(matches!(w.write_page(), Err(SddsError::ColumnNotSet { .. })));
        // Nothing was emitted, so the page stays open.
        w.set_column("y", vec![3.0, 4.0]).unwrap();
        w.write_page().unwrap();

        w.define_parameter("late", DataType::I8).unwrap_err();
        w.start_page(Some(0)).unwrap();
        w.write_page().unwrap();
        assert_eq!(w.pages_written(), 2);
    }

    #[test]
    fn test_terminate_writes_header_and_is_idempotent() {
        let mut w = writer();
        w.define_parameter("p", DataType::I32).unwrap();
        assert!(w.terminate(TerminateMode::Release).unwrap().is_none());
        assert!(w.terminate(TerminateMode::Release).unwrap().is_none());
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert!(text.contains("&parameter name=p, type=long, &end"));
        assert!(text.contains("&data mode=ascii"));
    }

    #[test]
    fn test_description_from_options() {
        let options = WriterOptions::ascii().with_description("beam run", "tracking");
        let mut w = SddsWriter::new(Vec::new(), options);
        assert_eq!(w.layout().description(), Some("beam run"));
        assert_eq!(w.layout().contents(), Some("tracking"));
        w.set_description(Some("renamed"), None).unwrap();
        assert_eq!(w.layout().description(), Some("renamed"));
        assert!(writer().layout().description().is_none());
    }

    #[test]
    fn test_initialize_copy() {
        let mut src = Layout::new();
        src.set_description(Some("source"), None).unwrap();
        src.define(FieldDef::parameter("p", DataType::F64)).unwrap();
        src.define(FieldDef::column("a", DataType::I32)).unwrap();
        src.define(FieldDef::column("b", DataType::I32)).unwrap();

        let mut w = writer();
        w.initialize_copy(&src, CopyDefinitions::WITHOUT_COLUMNS).unwrap();
        w.transfer_definition(&src, FieldKind::Column, "b", Some("beta"))
            .unwrap();
        assert_eq!(w.layout().description(), Some("source"));
        assert_eq!(w.layout().names(FieldKind::Parameter), ["p"]);
        assert_eq!(w.layout().names(FieldKind::Column), ["beta"]);
    }
}
