//! Per-handle error stack
//!
//! Library calls never print. A handle pushes each error it returns onto its
//! [`ErrorStack`]; the client decides when to render or clear it.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::{self, Write};

use crate::error::{ErrorKind, SddsError, Severity};

/// One recorded error
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorFrame {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SddsError> for ErrorFrame {
    fn from(err: &SddsError) -> Self {
        Self {
            severity: err.severity(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// How much of the stack to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintMode {
    /// Only the most recent frame
    TopOnly,
    /// Every frame, most recent first
    #[default]
    Verbose,
}

/// LIFO stack of error frames owned by one file handle
#[derive(Debug, Clone, Default)]
pub struct ErrorStack {
    frames: Vec<ErrorFrame>,
    suppress_warnings: bool,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop warnings instead of recording them
    pub fn suppress_warnings(&mut self, suppress: bool) {
        self.suppress_warnings = suppress;
    }

    pub fn warnings_suppressed(&self) -> bool {
        self.suppress_warnings
    }

    /// Record an error, returning whether it was kept
    pub fn push(&mut self, err: &SddsError) -> bool {
        self.push_frame(ErrorFrame::from(err))
    }

    /// Record a free-form message
    pub fn set_error(&mut self, severity: Severity, message: &str) -> bool {
        self.push_frame(ErrorFrame {
            severity,
            kind: ErrorKind::Message,
            message: message.into(),
        })
    }

    fn push_frame(&mut self, frame: ErrorFrame) -> bool {
        if frame.severity == Severity::Warning {
            if self.suppress_warnings {
                return false;
            }
            log::warn!("{}", frame.message);
        }
        self.frames.push(frame);
        true
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Frames in push order, oldest first
    pub fn frames(&self) -> &[ErrorFrame] {
        &self.frames
    }

    pub fn top(&self) -> Option<&ErrorFrame> {
        self.frames.last()
    }

    /// True if any recorded frame is fatal
    pub fn has_fatal(&self) -> bool {
        self.frames.iter().any(|f| f.severity == Severity::Fatal)
    }

    /// Write `Error for <program>:` and the frames, then empty the stack
    ///
    /// Nothing is written when the stack is empty.
    pub fn render<W: Write>(&mut self, out: &mut W, program: &str, mode: PrintMode) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(out, "Error for {program}:")?;
        let shown = match mode {
            PrintMode::TopOnly => 1,
            PrintMode::Verbose => self.frames.len(),
        };
        for frame in self.frames.iter().rev().take(shown) {
            match frame.severity {
                Severity::Warning => writeln!(out, "  warning: {}", frame.message)?,
                _ => writeln!(out, "  {}", frame.message)?,
            }
        }
        self.frames.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FieldKind;

    #[test]
    fn test_render_order() {
        let mut stack = ErrorStack::new();
        stack.push(&SddsError::NameNotFound {
            kind: FieldKind::Column,
            name: "q".into(),
        });
        stack.set_error(Severity::Fatal, "unable to read page");
        assert_eq!(stack.len(), 2);
        assert!(stack.has_fatal());

        let mut out = String::new();
        stack.render(&mut out, "sddsquery", PrintMode::Verbose).unwrap();
        assert_eq!(
            out,
            "Error for sddsquery:\n  unable to read page\n  no column named \"q\"\n"
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn test_top_only_and_clear() {
        let mut stack = ErrorStack::new();
        stack.set_error(Severity::Recoverable, "first");
        stack.set_error(Severity::Recoverable, "second");
        let mut out = String::new();
        stack.render(&mut out, "tool", PrintMode::TopOnly).unwrap();
        assert_eq!(out, "Error for tool:\n  second\n");

        stack.set_error(Severity::Recoverable, "again");
        stack.clear();
        let mut out = String::new();
        stack.render(&mut out, "tool", PrintMode::Verbose).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_suppressed_warnings() {
        let mut stack = ErrorStack::new();
        stack.suppress_warnings(true);
        let warning = SddsError::UnknownAttribute {
            directive: "column".into(),
            attribute: "colour".into(),
        };
        assert!(!stack.push(&warning));
        assert!(stack.is_empty());
        stack.suppress_warnings(false);
        assert!(stack.push(&warning));
        assert_eq!(stack.top().map(|f| f.kind), Some(ErrorKind::UnknownAttribute));
    }
}
