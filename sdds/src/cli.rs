//! Shared plumbing for the bundled command-line tools

use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Args, ValueEnum};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use sdds_core::{Endianness, ErrorStack, MajorOrder, Result};

use crate::channel::{print_errors, PrintErrors};
use crate::options::ReaderOptions;
use crate::reader::SddsReader;
use crate::source::Source;

/// Input and diagnostics flags common to every tool
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file; stdin when omitted or `-`
    pub input: Option<PathBuf>,

    /// Use stdin for input, stdout for output, or both (the default)
    #[arg(long, value_enum, num_args = 0..=1, require_equals = true, default_missing_value = "both")]
    pub pipe: Option<Pipe>,

    /// Use buffered reads instead of memory mapping the input
    #[arg(long)]
    pub no_mmap: bool,

    /// Keep the complete rows of a truncated final page
    #[arg(long)]
    pub recover: bool,

    /// Do not record or print warnings
    #[arg(long)]
    pub no_warnings: bool,

    /// Accept field names outside the usual character set
    #[arg(long)]
    pub any_name: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl InputArgs {
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions::default()
            .with_mmap(!self.no_mmap)
            .with_auto_recover(self.recover)
            .with_no_warnings(self.no_warnings)
            .with_any_name(self.any_name)
    }

    /// The input path, `None` for stdin
    pub fn path(&self) -> Option<&PathBuf> {
        if self.pipe.is_some_and(Pipe::reads_stdin) {
            return None;
        }
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }

    pub fn open(&self) -> Result<SddsReader<Source>> {
        match self.path() {
            Some(path) => SddsReader::open(path, self.reader_options()),
            None => Ok(SddsReader::from_stdin(self.reader_options())),
        }
    }

    /// Name of the input for messages
    pub fn display_name(&self) -> String {
        self.path()
            .map_or_else(|| "stdin".to_string(), |p| p.display().to_string())
    }
}

/// Which ends of a tool run through standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pipe {
    Input,
    Output,
    Both,
}

impl Pipe {
    pub fn reads_stdin(self) -> bool {
        matches!(self, Pipe::Input | Pipe::Both)
    }

    pub fn writes_stdout(self) -> bool {
        matches!(self, Pipe::Output | Pipe::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MajorOrderArg {
    Row,
    Column,
}

impl From<MajorOrderArg> for MajorOrder {
    fn from(arg: MajorOrderArg) -> Self {
        match arg {
            MajorOrderArg::Row => MajorOrder::Row,
            MajorOrderArg::Column => MajorOrder::Column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EndianArg {
    Little,
    Big,
    Native,
}

impl From<EndianArg> for Endianness {
    fn from(arg: EndianArg) -> Self {
        match arg {
            EndianArg::Little => Endianness::Little,
            EndianArg::Big => Endianness::Big,
            EndianArg::Native => Endianness::NATIVE,
        }
    }
}

/// Install a stderr logger; warnings and errors only at verbosity 0
pub fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(filter, Config::default(), TerminalMode::Stderr, ColorChoice::Auto).ok();
}

/// Print what `errors` recorded and exit with status 1 when `outcome` failed
///
/// `outcome`'s error is added unless it is already on top of the stack.
pub fn report(errors: &mut ErrorStack, outcome: Result<()>) {
    let mut stderr = io::stderr().lock();
    let failed = outcome.is_err();
    if let Err(err) = outcome {
        let message = err.to_string();
        if errors.top().map_or(true, |frame| frame.message != message) {
            errors.push(&err);
        }
    }
    if !errors.is_empty() {
        let flags = PrintErrors {
            verbose: true,
            exit: false,
        };
        if let Err(err) = print_errors(errors, &mut stderr, flags) {
            log::error!("could not print errors: {err}");
        }
    }
    if failed {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct ToolArgs {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, value_enum)]
        endian: Option<EndianArg>,
    }

    #[test]
    fn test_input_args() {
        let args = ToolArgs::parse_from(["tool", "-", "--recover", "-vv", "--endian", "big"]);
        assert!(args.input.path().is_none());
        assert_eq!(args.input.verbose, 2);
        assert_eq!(args.input.display_name(), "stdin");
        let options = args.input.reader_options();
        assert!(options.auto_recover);
        assert_eq!(args.endian.map(Endianness::from), Some(Endianness::Big));

        let args = ToolArgs::parse_from(["tool", "beam.sdds", "--no-mmap"]);
        assert_eq!(args.input.display_name(), "beam.sdds");
        assert!(!args.input.reader_options().use_mmap);

        let args = ToolArgs::parse_from(["tool", "beam.sdds", "--pipe"]);
        assert_eq!(args.input.pipe, Some(Pipe::Both));
        assert!(args.input.path().is_none());
        let args = ToolArgs::parse_from(["tool", "beam.sdds", "--pipe=output"]);
        assert_eq!(args.input.display_name(), "beam.sdds");
    }
}
