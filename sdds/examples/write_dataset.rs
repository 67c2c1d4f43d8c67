//! Write a small multi-page binary dataset with parameters, an array and columns

use sdds::{DataType, FieldDef, Result, SddsWriter, WriterOptions};
use std::time::Instant;

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "example_beam.sdds".into());
    let pages: i32 = 5;
    let rows = 100_000;

    let start = Instant::now();
    let options = WriterOptions::binary().with_description("Tracking output", "particle coordinates");
    let mut writer = SddsWriter::create(&path, options)?;
    writer.define_parameter("Step", DataType::I32)?;
    writer.define(FieldDef::parameter("Label", DataType::String))?;
    writer.define(FieldDef::parameter("Revision", DataType::I16).with_fixed_value("3"))?;
    writer.define_array("Matrix", DataType::F64, 2)?;
    writer.define(FieldDef::column("x", DataType::F64).with_units("m"))?;
    writer.define(FieldDef::column("xp", DataType::F32).with_units("rad"))?;
    writer.define_column("id", DataType::U32)?;

    for step in 0..pages {
        writer.start_page(Some(rows))?;
        writer.set_parameter("Step", step)?;
        writer.set_parameter("Label", format!("pass {step}"))?;
        let matrix: Vec<f64> = (0..6).map(|i| f64::from(i) * 0.5).collect();
        writer.set_array("Matrix", &[2, 3], matrix)?;

        let x: Vec<f64> = (0..rows).map(|i| (i as f64 * 1e-3).sin()).collect();
        let xp: Vec<f32> = (0..rows).map(|i| (i as f32 * 1e-3).cos()).collect();
        let id: Vec<u32> = (0..rows as u32).collect();
        writer.set_column("x", x)?;
        writer.set_column("xp", xp)?;
        writer.set_column("id", id)?;
        writer.write_page()?;
    }
    writer.into_inner()?;

    println!("Wrote {pages} pages of {rows} rows to {path} in {:?}", start.elapsed());
    println!("\nRun 'cargo run --example read_dataset {path}' to read it back!");
    Ok(())
}
