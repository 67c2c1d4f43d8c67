//! Error printing and the process-wide program name

use std::io::{self, Write};
use std::sync::OnceLock;

use sdds_core::{ErrorStack, PrintMode};

static PROGRAM_NAME: OnceLock<String> = OnceLock::new();

/// Set the diagnostic prefix once at startup; later calls are ignored
pub fn register_program_name(name: &str) {
    if PROGRAM_NAME.set(name.to_string()).is_err() {
        log::debug!("program name already registered, ignoring {name:?}");
    }
}

/// The registered program name, or `"sdds"`
pub fn program_name() -> &'static str {
    PROGRAM_NAME.get().map_or("sdds", String::as_str)
}

/// Flags for [`print_errors`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintErrors {
    /// Print every frame instead of only the most recent
    pub verbose: bool,
    /// Exit the process with status 1 after printing
    pub exit: bool,
}

impl PrintErrors {
    pub const VERBOSE_EXIT: PrintErrors = PrintErrors {
        verbose: true,
        exit: true,
    };
}

/// Drain `errors` to `sink` under the registered program name
pub fn print_errors<W: Write>(errors: &mut ErrorStack, sink: &mut W, flags: PrintErrors) -> io::Result<()> {
    let mode = if flags.verbose {
        PrintMode::Verbose
    } else {
        PrintMode::TopOnly
    };
    let printed = !errors.is_empty();
    let mut text = String::new();
    errors
        .render(&mut text, program_name(), mode)
        .map_err(io::Error::other)?;
    sink.write_all(text.as_bytes())?;
    sink.flush()?;
    if flags.exit && printed {
        std::process::exit(1);
    }
    Ok(())
}
