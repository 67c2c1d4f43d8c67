//! Convert an SDDS dataset between encodings, orders and byte orders,
//! optionally dropping columns or pages

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use sdds::cli::{init_logging, report, EndianArg, InputArgs, MajorOrderArg, Pipe};
use sdds::{
    register_program_name, CopyDefinitions, DataMode, Encoding, FieldKind, Result, SddsReader,
    SddsWriter, Selection, Source, TerminateMode, WriterOptions,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Rewrite an SDDS dataset with a different data mode or subset")]
struct Cli {
    #[command(flatten)]
    input: InputArgs,

    /// Output file; stdout when omitted
    output: Option<PathBuf>,

    /// Write binary pages
    #[arg(long, conflicts_with = "ascii")]
    binary: bool,

    /// Write text pages
    #[arg(long)]
    ascii: bool,

    /// Orientation of the tabular region
    #[arg(long, value_enum)]
    major_order: Option<MajorOrderArg>,

    /// Byte order of binary pages
    #[arg(long, value_enum)]
    endian: Option<EndianArg>,

    /// End text pages with a blank line instead of a row count
    #[arg(long)]
    no_row_counts: bool,

    /// Keep only columns matching these patterns
    #[arg(long, value_delimiter = ',')]
    retain: Vec<String>,

    /// Drop columns matching these patterns
    #[arg(long, value_delimiter = ',')]
    delete: Vec<String>,

    /// First page to copy, 1-based
    #[arg(long, default_value_t = 1)]
    from_page: u32,

    /// Last page to copy
    #[arg(long)]
    to_page: Option<u32>,

    /// Replace the layout description: TEXT[,CONTENTS]
    #[arg(long, value_delimiter = ',', num_args = 1..=2)]
    description: Vec<String>,
}

impl Cli {
    fn writer_options(&self, source: &DataMode) -> WriterOptions {
        let encoding = if self.binary {
            Encoding::Binary
        } else if self.ascii {
            Encoding::Ascii
        } else {
            source.encoding
        };
        let major_order = self.major_order.map_or(source.major_order, Into::into);
        let mut options = WriterOptions::default()
            .with_encoding(encoding)
            .with_major_order(major_order)
            .with_no_row_counts(self.no_row_counts)
            .with_no_warnings(self.input.no_warnings);
        if let Some(endian) = self.endian {
            options = options.with_endianness(endian.into());
        }
        options
    }

    fn column_selection(&self) -> Selection {
        let selection = if self.retain.is_empty() {
            Selection::matching(["*"])
        } else {
            Selection::matching(self.retain.iter().map(String::as_str))
        };
        self.delete
            .iter()
            .fold(selection, |selection, pattern| selection.and_not(pattern))
    }

    /// Output path, `None` for stdout
    ///
    /// With `--pipe=input` the only file argument names the output.
    fn output_path(&self) -> Option<&PathBuf> {
        let path = match self.input.pipe {
            Some(pipe) if pipe.writes_stdout() => None,
            Some(Pipe::Input) => self.output.as_ref().or(self.input.input.as_ref()),
            _ => self.output.as_ref(),
        };
        path.filter(|p| p.as_os_str() != "-")
    }

    fn wants_page(&self, page: u32) -> bool {
        page >= self.from_page && self.to_page.map_or(true, |last| page <= last)
    }
}

fn run(cli: &Cli, reader: &mut SddsReader<Source>) -> Result<()> {
    let mode = *reader.read_layout()?.data_mode();
    let options = cli.writer_options(&mode);
    match cli.output_path() {
        Some(path) => convert(cli, reader, SddsWriter::create(path, options)?),
        None => convert(cli, reader, SddsWriter::to_stdout(options)),
    }
}

fn convert<W: Write>(cli: &Cli, reader: &mut SddsReader<Source>, mut writer: SddsWriter<W>) -> Result<()> {
    let layout = reader.shared_layout();
    writer.initialize_copy(&layout, CopyDefinitions::WITHOUT_COLUMNS)?;
    for name in cli.column_selection().resolve_names(&layout, FieldKind::Column) {
        writer.transfer_definition(&layout, FieldKind::Column, name, None)?;
    }
    if let Some((text, rest)) = cli.description.split_first() {
        let contents = rest.first().map(String::as_str).or(layout.contents());
        writer.set_description(Some(text), contents)?;
    }
    writer.write_layout()?;

    let mut copied = 0u32;
    while let Some(number) = reader.read_page()? {
        if !cli.wants_page(number) {
            continue;
        }
        writer.start_page(None)?;
        writer.copy_page_from(reader.page())?;
        writer.write_page()?;
        copied += 1;
        if cli.to_page.is_some_and(|last| number >= last) {
            break;
        }
    }
    writer.terminate(TerminateMode::Release)?;
    log::info!(
        "copied {copied} of {} pages from {}",
        reader.pages_read(),
        cli.input.display_name()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.input.verbose);
    register_program_name("sddsconvert");

    let mut reader = match cli.input.open() {
        Ok(reader) => reader,
        Err(err) => {
            let mut errors = sdds::ErrorStack::new();
            report(&mut errors, Err(err));
            return;
        }
    };
    let outcome = run(&cli, &mut reader);
    report(reader.errors_mut(), outcome);
}
