//! Binary and text page encode/decode throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sdds::{
    DataType, Endianness, MajorOrder, ReaderOptions, SddsReader, SddsWriter, WriterOptions,
};
use std::io::Cursor;

const ROWS: usize = 100_000;

fn encode(options: WriterOptions) -> Vec<u8> {
    let mut writer = SddsWriter::new(Vec::new(), options);
    writer.define_parameter("Step", DataType::I32).unwrap();
    writer.define_column("x", DataType::F64).unwrap();
    writer.define_column("n", DataType::I32).unwrap();
    writer.define_column("w", DataType::F32).unwrap();
    writer.start_page(Some(ROWS)).unwrap();
    writer.set_parameter("Step", 1).unwrap();
    writer
        .set_column("x", (0..ROWS).map(|i| i as f64 * 0.25).collect::<Vec<_>>())
        .unwrap();
    writer
        .set_column("n", (0..ROWS as i32).collect::<Vec<_>>())
        .unwrap();
    writer
        .set_column("w", (0..ROWS).map(|i| i as f32).collect::<Vec<_>>())
        .unwrap();
    writer.write_page().unwrap();
    writer.into_inner().unwrap()
}

fn decode(bytes: &[u8]) -> usize {
    let mut reader = SddsReader::from_reader(Cursor::new(bytes), ReaderOptions::default());
    reader.read_page().unwrap();
    reader.page().row_count()
}

fn bench_binary(c: &mut Criterion) {
    let cases = [
        ("row_native", MajorOrder::Row, Endianness::NATIVE),
        ("column_native", MajorOrder::Column, Endianness::NATIVE),
        ("row_swapped", MajorOrder::Row, swapped()),
        ("column_swapped", MajorOrder::Column, swapped()),
    ];
    for (name, order, endianness) in cases {
        let options = WriterOptions::binary()
            .with_major_order(order)
            .with_endianness(endianness);
        c.bench_function(&format!("binary_encode_{name}_100k"), |b| {
            b.iter(|| black_box(encode(options.clone())))
        });
        let bytes = encode(options);
        c.bench_function(&format!("binary_decode_{name}_100k"), |b| {
            b.iter(|| black_box(decode(&bytes)))
        });
    }
}

fn bench_text(c: &mut Criterion) {
    let bytes = encode(WriterOptions::ascii());
    c.bench_function("text_encode_row_100k", |b| {
        b.iter(|| black_box(encode(WriterOptions::ascii())))
    });
    c.bench_function("text_decode_row_100k", |b| {
        b.iter(|| black_box(decode(&bytes)))
    });
}

fn swapped() -> Endianness {
    match Endianness::NATIVE {
        Endianness::Little => Endianness::Big,
        Endianness::Big => Endianness::Little,
    }
}

criterion_group!(benches, bench_binary, bench_text);
criterion_main!(benches);
