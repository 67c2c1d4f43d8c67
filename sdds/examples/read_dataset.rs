//! Read a dataset page by page and summarize its columns

use sdds::{ReaderOptions, Result, SddsReader, TerminateMode, TypeFilter};
use std::time::Instant;

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "example_beam.sdds".into());

    let start = Instant::now();
    let mut reader = SddsReader::open(&path, ReaderOptions::default())?;
    let layout = reader.read_layout()?;
    println!(
        "{path}: {} parameters, {} arrays, {} columns ({})",
        layout.parameters().len(),
        layout.arrays().len(),
        layout.columns().len(),
        layout.data_mode().encoding.as_str(),
    );
    reader.check_column("x", Some("m"), TypeFilter::Numeric)?;

    while let Some(page) = reader.read_page()? {
        let x = reader.page().column_as_f64("x")?;
        let mean = x.iter().sum::<f64>() / x.len().max(1) as f64;
        let step = reader.parameter("Step")?;
        println!("page {page}: Step={step} rows={} mean(x)={mean:.6}", x.len());
    }

    let pages = reader.pages_read();
    reader.terminate(TerminateMode::Release)?;
    println!("Read {pages} pages in {:?}", start.elapsed());
    Ok(())
}
