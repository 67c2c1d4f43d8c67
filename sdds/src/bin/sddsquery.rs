//! Describe the layout of an SDDS dataset

use std::io::{self, Write};

use clap::Parser;
use serde::Serialize;

use sdds::cli::{init_logging, report, InputArgs};
use sdds::{
    register_program_name, AssociateDef, DataMode, FieldDef, Layout, Result, SddsError, SddsReader,
    Source,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the parameters, arrays and columns of an SDDS dataset")]
struct Cli {
    #[command(flatten)]
    input: InputArgs,

    /// Emit a JSON document instead of text
    #[arg(long)]
    json: bool,

    /// Also read every page and report its row count and parameters
    #[arg(long)]
    pages: bool,
}

#[derive(Debug, Serialize)]
struct PageSummary {
    page: u32,
    rows: usize,
    parameters: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    input: String,
    description: Option<&'a str>,
    contents: Option<&'a str>,
    data_mode: DataMode,
    parameters: &'a [FieldDef],
    arrays: &'a [FieldDef],
    columns: &'a [FieldDef],
    associates: &'a [AssociateDef],
    #[serde(skip_serializing_if = "Option::is_none")]
    pages: Option<Vec<PageSummary>>,
}

fn read_pages(reader: &mut SddsReader<Source>) -> Result<Vec<PageSummary>> {
    let mut pages = Vec::new();
    while let Some(page) = reader.read_page()? {
        let current = reader.page();
        let parameters = current
            .layout()
            .parameters()
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let value = current.parameter_at(i).map(ToString::to_string).unwrap_or_default();
                (def.name.clone(), value)
            })
            .collect();
        pages.push(PageSummary {
            page,
            rows: current.row_count(),
            parameters,
        });
    }
    Ok(pages)
}

fn write_fields<W: Write>(out: &mut W, title: &str, fields: &[FieldDef]) -> io::Result<()> {
    if fields.is_empty() {
        return Ok(());
    }
    writeln!(out, "{} {title}:", fields.len())?;
    let width = fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
    for def in fields {
        write!(out, "  {:width$}  {:<10}", def.name, def.data_type.header_name())?;
        if def.dimensions > 0 {
            write!(out, "  dims={}", def.dimensions)?;
        }
        if let Some(units) = def.units.as_deref() {
            write!(out, "  [{units}]")?;
        }
        if let Some(description) = def.description.as_deref() {
            write!(out, "  {description}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_text<W: Write>(out: &mut W, summary: &Summary<'_>) -> io::Result<()> {
    writeln!(out, "file: {}", summary.input)?;
    if let Some(description) = summary.description {
        writeln!(out, "description: {description}")?;
    }
    if let Some(contents) = summary.contents {
        writeln!(out, "contents: {contents}")?;
    }
    let mode = &summary.data_mode;
    write!(
        out,
        "data mode: {}, {}-major",
        mode.encoding.as_str(),
        mode.major_order.as_str()
    )?;
    if mode.is_binary() {
        write!(out, ", {}-endian", mode.endianness.as_str())?;
    }
    writeln!(out)?;
    write_fields(out, "parameters", summary.parameters)?;
    write_fields(out, "arrays", summary.arrays)?;
    write_fields(out, "columns", summary.columns)?;
    for associate in summary.associates {
        writeln!(out, "associate: {}", associate.name)?;
    }
    for page in summary.pages.iter().flatten() {
        write!(out, "page {}: {} rows", page.page, page.rows)?;
        for (name, value) in &page.parameters {
            write!(out, ", {name}={value}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn run(cli: &Cli, reader: &mut SddsReader<Source>) -> Result<()> {
    reader.read_layout()?;
    let pages = if cli.pages {
        Some(read_pages(reader)?)
    } else {
        None
    };
    let layout: &Layout = reader.layout();
    let summary = Summary {
        input: cli.input.display_name(),
        description: layout.description(),
        contents: layout.contents(),
        data_mode: *layout.data_mode(),
        parameters: layout.parameters(),
        arrays: layout.arrays(),
        columns: layout.columns(),
        associates: layout.associates(),
        pages,
    };

    let mut out = io::stdout().lock();
    if cli.json {
        serde_json::to_writer_pretty(&mut out, &summary).map_err(io::Error::other)?;
        writeln!(out)?;
    } else {
        write_text(&mut out, &summary)?;
    }
    out.flush().map_err(SddsError::from)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.input.verbose);
    register_program_name("sddsquery");

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
