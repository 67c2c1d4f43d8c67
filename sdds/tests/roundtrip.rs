//! End-to-end reader/writer tests over in-memory and on-disk datasets

use std::io::{self, Cursor, Write};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdds::{
    ArrayData, CharCode, ColumnData, DataType, Endianness, ErrorKind, FieldDef, FieldKind,
    MajorOrder, Page, ReaderOptions, ReaderState, SddsError, SddsReader, SddsWriter, Severity,
    TerminateMode, Value, WriterOptions, WriterState,
};

fn reader_over(bytes: Vec<u8>) -> SddsReader<Cursor<Vec<u8>>> {
    SddsReader::from_reader(Cursor::new(bytes), ReaderOptions::default())
}

fn swapped() -> Endianness {
    match Endianness::NATIVE {
        Endianness::Little => Endianness::Big,
        Endianness::Big => Endianness::Little,
    }
}

#[test]
fn test_text_round_trip_one_page() {
    let mut writer = SddsWriter::new(Vec::new(), WriterOptions::ascii());
    writer.define_column("x", DataType::F64).unwrap();
    writer.define_parameter("note", DataType::String).unwrap();
    writer.start_page(None).unwrap();
    writer.set_parameter("note", "hello world").unwrap();
    writer.set_column("x", vec![1.5, 2.5, 3.5]).unwrap();
    writer.write_page().unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = reader_over(bytes);
    assert_eq!(reader.read_page().unwrap(), Some(1));
    assert_eq!(
        reader.parameter("note").unwrap(),
        Value::String("hello world".into())
    );
    assert_eq!(reader.column::<f64>("x").unwrap(), [1.5, 2.5, 3.5]);
    assert_eq!(reader.page().row_count(), 3);
    assert_eq!(reader.read_page().unwrap(), None);
}

#[test]
fn test_text_strings_with_line_breaks() {
    let mut writer = SddsWriter::new(Vec::new(), WriterOptions::ascii());
    writer.define_parameter("note", DataType::String).unwrap();
    writer.define_column("label", DataType::String).unwrap();
    writer.define_column("x", DataType::F64).unwrap();
    writer.start_page(None).unwrap();
    writer.set_parameter("note", "line1\nline2").unwrap();
    writer
        .set_column("label", vec![String::from("a\nb"), String::from("\n")])
        .unwrap();
    writer.set_column("x", vec![1.0, 2.0]).unwrap();
    writer.write_page().unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = reader_over(bytes);
    assert_eq!(reader.read_page().unwrap(), Some(1));
    assert_eq!(
        reader.parameter("note").unwrap(),
        Value::String("line1\nline2".into())
    );
    assert_eq!(
        reader.get_column("label").unwrap(),
        ColumnData::String(vec!["a\nb".into(), "\n".into()])
    );
    assert_eq!(reader.column::<f64>("x").unwrap(), [1.0, 2.0]);
    assert_eq!(reader.read_page().unwrap(), None);
}

const I32_LAYOUT: &str = "SDDS5\n&column name=k, type=long, &end\n";

fn i32_file(endian: &str, rows: &[[u8; 4]], count: [u8; 4]) -> Vec<u8> {
    let mut bytes = format!("{I32_LAYOUT}&data mode=binary, endian={endian}, &end\n").into_bytes();
    bytes.extend_from_slice(&count);
    for row in rows {
        bytes.extend_from_slice(row);
    }
    bytes
}

#[test]
fn test_binary_either_byte_order() {
    let expected = [0x0102_0304, 0x7FFF_FFFF, -1];
    let big = i32_file(
        "big",
        &expected.map(i32::to_be_bytes),
        3u32.to_be_bytes(),
    );
    let little = i32_file(
        "little",
        &expected.map(i32::to_le_bytes),
        3u32.to_le_bytes(),
    );
    for bytes in [big, little] {
        let mut reader = reader_over(bytes);
        assert_eq!(reader.read_page().unwrap(), Some(1));
        assert_eq!(reader.column::<i32>("k").unwrap(), expected);
        assert_eq!(reader.read_page().unwrap(), None);
    }
}

#[test]
fn test_writer_byte_order_override() {
    let values = vec![0x0102_0304i32, 0x7FFF_FFFF, -1];
    let mut outputs = Vec::new();
    for endianness in [Endianness::Little, Endianness::Big] {
        let mut writer = SddsWriter::new(
            Vec::new(),
            WriterOptions::binary().with_endianness(endianness),
        );
        writer.define_column("k", DataType::I32).unwrap();
        writer.start_page(None).unwrap();
        writer.set_column("k", values.clone()).unwrap();
        writer.write_page().unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = reader_over(bytes.clone());
        reader.read_page().unwrap();
        assert_eq!(reader.layout().data_mode().endianness, endianness);
        assert_eq!(reader.column::<i32>("k").unwrap(), values);
        outputs.push(bytes);
    }
    // Body: row count then three values.
    let little = &outputs[0][outputs[0].len() - 16..];
    let big = &outputs[1][outputs[1].len() - 16..];
    assert_eq!(&big[..4], &3u32.to_be_bytes());
    assert_eq!(&big[4..8], &[1u8, 2, 3, 4]);
    assert_eq!(&little[4..8], &[4u8, 3, 2, 1]);
}

#[test]
fn test_empty_page() {
    for options in [WriterOptions::ascii(), WriterOptions::binary()] {
        let mut writer = SddsWriter::new(Vec::new(), options);
        writer.define_parameter("p", DataType::I32).unwrap();
        writer.define_column("x", DataType::F64).unwrap();
        writer.start_page(Some(0)).unwrap();
        writer.set_parameter("p", 42).unwrap();
        writer.write_page().unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = reader_over(bytes);
        assert_eq!(reader.read_page().unwrap(), Some(1));
        assert_eq!(reader.page().parameter_as::<i32>("p").unwrap(), 42);
        assert_eq!(reader.page().row_count(), 0);
        assert!(reader.column::<f64>("x").unwrap().is_empty());
        assert_eq!(reader.read_page().unwrap(), None);
    }
}

fn two_columns(options: WriterOptions) -> Vec<u8> {
    let mut writer = SddsWriter::new(Vec::new(), options);
    writer.define_column("x", DataType::F64).unwrap();
    writer.define_column("y", DataType::F64).unwrap();
    writer.start_page(None).unwrap();
    writer.set_column("x", vec![0.0, 1.0, 2.0]).unwrap();
    writer.set_column("y", vec![10.0, 20.0, 30.0]).unwrap();
    writer.write_page().unwrap();
    writer.into_inner().unwrap()
}

#[test]
fn test_major_order_equivalence() {
    for base in [WriterOptions::ascii(), WriterOptions::binary()] {
        let row = two_columns(base.clone().with_major_order(MajorOrder::Row));
        let column = two_columns(base.with_major_order(MajorOrder::Column));
        assert_ne!(row, column);

        let mut decoded = Vec::new();
        for bytes in [row, column] {
            let mut reader = reader_over(bytes);
            reader.read_page().unwrap();
            decoded.push((
                reader.get_column("x").unwrap(),
                reader.get_column("y").unwrap(),
            ));
        }
        assert_eq!(decoded[0], decoded[1]);
        assert_eq!(decoded[0].1, ColumnData::F64(vec![10.0, 20.0, 30.0]));
    }
}

#[test]
fn test_malformed_magic() {
    let mut reader = reader_over(b"NOT_A_FORMAT_FILE\n".to_vec());
    assert!(matches!(
        reader.read_page(),
        Err(SddsError::NotAFormatFile { .. })
    ));
    assert_eq!(
        reader.errors().top().map(|f| f.kind),
        Some(ErrorKind::NotAFormatFile)
    );
    reader.terminate(TerminateMode::Release).unwrap();
    reader.terminate(TerminateMode::Release).unwrap();
    assert_eq!(reader.state(), ReaderState::Terminated);
}

#[test]
fn test_duplicate_name() {
    let mut writer = SddsWriter::new(Vec::new(), WriterOptions::ascii());
    writer.define_column("x", DataType::F64).unwrap();
    let err = writer.define_column("x", DataType::F32).unwrap_err();
    assert!(matches!(err, SddsError::DuplicateName { .. }));
    let columns = writer.layout().columns();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].data_type, DataType::F64);
    // Definition errors do not poison the handle.
    writer.write_layout().unwrap();
    assert_eq!(writer.state(), WriterState::LayoutWritten);
}

const ALPHABET: &[u8] = b"abcXYZ019 _-\"\\!.,=\t\n";

fn random_string(rng: &mut StdRng) -> String {
    let len = rng.gen_range(0..8);
    (0..len)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

fn random_column(rng: &mut StdRng, data_type: DataType, rows: usize) -> ColumnData {
    match data_type {
        DataType::I8 => (0..rows).map(|_| rng.gen::<i8>()).collect::<Vec<_>>().into(),
        DataType::I16 => (0..rows).map(|_| rng.gen::<i16>()).collect::<Vec<_>>().into(),
        DataType::I32 => (0..rows).map(|_| rng.gen::<i32>()).collect::<Vec<_>>().into(),
        DataType::I64 => (0..rows).map(|_| rng.gen::<i64>()).collect::<Vec<_>>().into(),
        DataType::U8 => (0..rows).map(|_| rng.gen::<u8>()).collect::<Vec<_>>().into(),
        DataType::U16 => (0..rows).map(|_| rng.gen::<u16>()).collect::<Vec<_>>().into(),
        DataType::U32 => (0..rows).map(|_| rng.gen::<u32>()).collect::<Vec<_>>().into(),
        DataType::U64 => (0..rows).map(|_| rng.gen::<u64>()).collect::<Vec<_>>().into(),
        DataType::F32 => (0..rows)
            .map(|_| rng.gen_range(-1.0e4f32..1.0e4))
            .collect::<Vec<_>>()
            .into(),
        DataType::F64 => (0..rows)
            .map(|_| rng.gen_range(-1.0e9..1.0e9))
            .collect::<Vec<f64>>()
            .into(),
        DataType::Char => (0..rows)
            .map(|_| CharCode(rng.gen()))
            .collect::<Vec<_>>()
            .into(),
        DataType::String => (0..rows)
            .map(|_| random_string(rng))
            .collect::<Vec<_>>()
            .into(),
    }
}

const KINDS: [DataType; 12] = [
    DataType::I8,
    DataType::I16,
    DataType::I32,
    DataType::I64,
    DataType::U8,
    DataType::U16,
    DataType::U32,
    DataType::U64,
    DataType::F32,
    DataType::F64,
    DataType::Char,
    DataType::String,
];

/// Parameters, arrays and columns as written, per page
struct Expected {
    parameters: Vec<Value>,
    arrays: Vec<ArrayData>,
    columns: Vec<ColumnData>,
}

fn define_everything<W: Write>(writer: &mut SddsWriter<W>) {
    writer.set_description(Some("all kinds"), Some("test")).unwrap();
    writer.define_parameter("Step", DataType::I32).unwrap();
    writer.define_parameter("Label", DataType::String).unwrap();
    writer.define_parameter("Tag", DataType::Char).unwrap();
    writer
        .define(FieldDef::parameter("Revision", DataType::I16).with_fixed_value("3"))
        .unwrap();
    writer.define_array("Matrix", DataType::F64, 2).unwrap();
    writer.define_array("Names", DataType::String, 1).unwrap();
    for kind in KINDS {
        let name = format!("c_{}", kind.header_name());
        writer
            .define(FieldDef::column(&name, kind).with_units("u"))
            .unwrap();
    }
}

fn write_random_pages<W: Write>(writer: &mut SddsWriter<W>, rng: &mut StdRng) -> Vec<Expected> {
    let mut pages = Vec::new();
    for step in 0..4 {
        let rows = if step == 2 { 0 } else { rng.gen_range(1..30) };
        let page = writer.start_page(Some(rows)).unwrap();
        let parameters = vec![
            Value::I32(step),
            Value::String(random_string(rng)),
            Value::Char(CharCode(rng.gen())),
            Value::I16(3),
        ];
        for (i, value) in parameters.iter().take(3).enumerate() {
            page.set_parameter_at(i, value.clone()).unwrap();
        }
        let arrays = vec![
            ArrayData {
                dims: vec![2, 3],
                data: random_column(rng, DataType::F64, 6),
            },
            ArrayData {
                dims: vec![4],
                data: random_column(rng, DataType::String, 4),
            },
        ];
        for (i, array) in arrays.iter().enumerate() {
            page.set_array_at(i, &array.dims, array.data.clone()).unwrap();
        }
        let columns: Vec<ColumnData> = KINDS
            .iter()
            .map(|&kind| random_column(rng, kind, rows))
            .collect();
        for (i, column) in columns.iter().enumerate() {
            page.set_column_at(i, column.clone()).unwrap();
        }
        writer.write_page().unwrap();
        pages.push(Expected {
            parameters,
            arrays,
            columns,
        });
    }
    pages
}

fn assert_pages<R: io::BufRead>(reader: &mut SddsReader<R>, expected: &[Expected]) {
    for (i, want) in expected.iter().enumerate() {
        assert_eq!(reader.read_page().unwrap(), Some(i as u32 + 1));
        let page = reader.page();
        for (j, value) in want.parameters.iter().enumerate() {
            assert_eq!(page.parameter_at(j), Some(value), "page {} parameter {j}", i + 1);
        }
        for (j, array) in want.arrays.iter().enumerate() {
            assert_eq!(page.array_at(j), Some(array), "page {} array {j}", i + 1);
        }
        for (j, column) in want.columns.iter().enumerate() {
            let got = page.column_at(j).unwrap();
            assert_eq!(got.len(), page.row_count());
            assert_eq!(got, column, "page {} column {j}", i + 1);
        }
    }
    assert_eq!(reader.read_page().unwrap(), None);
    assert_eq!(reader.read_page().unwrap(), None);
}

#[test]
fn test_random_pages_round_trip_every_mode() {
    let modes = [
        WriterOptions::ascii(),
        WriterOptions::ascii().with_major_order(MajorOrder::Column),
        WriterOptions::binary(),
        WriterOptions::binary().with_major_order(MajorOrder::Column),
        WriterOptions::binary().with_endianness(swapped()),
        WriterOptions::binary()
            .with_major_order(MajorOrder::Column)
            .with_endianness(swapped()),
    ];
    let mut rng = StdRng::seed_from_u64(0x5dd5);
    for options in modes {
        let mut writer = SddsWriter::new(Vec::new(), options.clone());
        define_everything(&mut writer);
        let expected = write_random_pages(&mut writer, &mut rng);
        let written = writer.layout().clone();
        let bytes = writer.into_inner().unwrap();

        let mut reader = reader_over(bytes);
        let layout = reader.read_layout().unwrap();
        assert!(layout.same_definitions(&written), "{options:?}");
        assert_eq!(*layout.data_mode(), options.resolved_data_mode());
        assert_pages(&mut reader, &expected);
    }
}

#[test]
fn test_no_row_counts_text() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut writer = SddsWriter::new(Vec::new(), WriterOptions::ascii().with_no_row_counts(true));
    define_everything(&mut writer);
    let expected = write_random_pages(&mut writer, &mut rng);
    let mut reader = reader_over(writer.into_inner().unwrap());
    assert!(reader.read_layout().unwrap().data_mode().no_row_counts);
    assert_pages(&mut reader, &expected);
}

#[test]
fn test_no_row_counts_rejects_column_major() {
    let options = WriterOptions::ascii()
        .with_no_row_counts(true)
        .with_major_order(MajorOrder::Column);
    let mut writer = SddsWriter::new(Vec::new(), options);
    writer.define_column("x", DataType::F64).unwrap();
    assert!(writer.write_layout().is_err());
    assert_eq!(writer.state(), WriterState::Configuring);
}

#[test]
fn test_row_mask_does_not_change_output() {
    let encode = |flags: &[bool]| {
        let mut writer = SddsWriter::new(Vec::new(), WriterOptions::binary());
        writer.define_column("x", DataType::F64).unwrap();
        let page = writer.start_page(None).unwrap();
        page.set_column("x", vec![1.0, 2.0, 3.0]).unwrap();
        for (row, &flag) in flags.iter().enumerate() {
            page.set_row_flag(row, flag);
        }
        writer.write_page().unwrap();
        writer.into_inner().unwrap()
    };
    assert_eq!(encode(&[]), encode(&[false, true, false]));
}

#[test]
fn test_copy_page_between_handles() {
    let mut source = SddsWriter::new(Vec::new(), WriterOptions::binary());
    source.define_parameter("a", DataType::I32).unwrap();
    source.define_parameter("b", DataType::F64).unwrap();
    source.define_column("x", DataType::F64).unwrap();
    source.define_column("label", DataType::String).unwrap();
    source.start_page(None).unwrap();
    source.set_parameter("a", 5).unwrap();
    source.set_parameter("b", 0.25).unwrap();
    source.set_column("x", vec![1.0, 2.0, 3.0]).unwrap();
    source
        .set_column("label", vec!["p".to_string(), "q".into(), "r".into()])
        .unwrap();
    source.write_page().unwrap();

    let mut reader = reader_over(source.into_inner().unwrap());
    reader.read_page().unwrap();
    reader.page_mut().set_row_flag(1, false);
    assert_eq!(reader.page().count_rows_of_interest(), 2);

    // Destination declares its parameters in the other order and drops a column.
    let mut writer = SddsWriter::new(Vec::new(), WriterOptions::ascii());
    writer.define_parameter("b", DataType::F64).unwrap();
    writer.define_parameter("a", DataType::I64).unwrap();
    writer
        .transfer_definition(reader.layout(), FieldKind::Column, "label", Some("name"))
        .unwrap();
    writer
        .transfer_definition(reader.layout(), FieldKind::Column, "x", None)
        .unwrap();
    let page = writer.start_page(None).unwrap();
    page.copy_parameters_from(reader.page()).unwrap();
    assert_eq!(page.parameter("a").unwrap(), &Value::I64(5));
    assert_eq!(page.parameter("b").unwrap(), &Value::F64(0.25));
    page.copy_from(reader.page()).unwrap();
    assert_eq!(page.count_rows_of_interest(), 3);
    assert_eq!(page.column::<f64>("x").unwrap(), [1.0, 2.0, 3.0]);
    // "name" has no counterpart in the source.
    assert!(matches!(
        writer.write_page(),
        Err(SddsError::ColumnNotSet { .. })
    ));
    writer
        .set_column("name", vec!["u".to_string(), "v".into(), "w".into()])
        .unwrap();
    writer.write_page().unwrap();

    let retained = writer.terminate(TerminateMode::RetainPage).unwrap().unwrap();
    assert_eq!(retained.get_column("name").unwrap().strings().unwrap()[2], "w");
    assert!(writer.terminate(TerminateMode::RetainPage).unwrap().is_none());
}

#[test]
fn test_truncated_page_and_recovery() {
    let mut writer = SddsWriter::new(Vec::new(), WriterOptions::binary());
    writer.define_column("x", DataType::F64).unwrap();
    writer.start_page(None).unwrap();
    writer.set_column("x", vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    writer.write_page().unwrap();
    let mut bytes = writer.into_inner().unwrap();
    bytes.truncate(bytes.len() - 4);

    let mut strict = reader_over(bytes.clone());
    assert!(matches!(strict.read_page(), Err(SddsError::Truncated { .. })));
    assert!(matches!(strict.read_page(), Err(SddsError::InvalidState { .. })));
    assert!(strict.terminate(TerminateMode::Release).is_ok());

    let options = ReaderOptions::default().with_auto_recover(true);
    let mut lenient = SddsReader::from_reader(Cursor::new(bytes), options);
    assert_eq!(lenient.read_page().unwrap(), Some(1));
    assert_eq!(lenient.column::<f64>("x").unwrap(), [1.0, 2.0, 3.0]);
    assert_eq!(
        lenient.errors().top().map(|f| f.kind),
        Some(ErrorKind::Message)
    );
    assert_eq!(lenient.read_page().unwrap(), None);
}

#[test]
fn test_bad_numeric_value() {
    let text = "SDDS5\n&column name=x, type=double, &end\n&data mode=ascii, &end\n2\n1.0\nnope\n";
    let mut reader = reader_over(text.as_bytes().to_vec());
    match reader.read_page() {
        Err(SddsError::BadNumericValue { field, row, .. }) => {
            assert_eq!(field, "x");
            assert_eq!(row, Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_impossible_row_count() {
    let text = "SDDS5\n&parameter name=p, type=long, &end\n&data mode=ascii, &end\n4\n999999999999999\n";
    let mut reader = reader_over(text.as_bytes().to_vec());
    assert!(matches!(
        reader.read_page(),
        Err(SddsError::MalformedPage { page: 1, .. })
    ));
    assert!(reader.errors().has_fatal());
    assert!(matches!(reader.read_page(), Err(SddsError::InvalidState { .. })));
}

fn latin1_string_file() -> Vec<u8> {
    let mut bytes =
        b"SDDS5\n&column name=s, type=string, &end\n&data mode=binary, endian=little, &end\n".to_vec();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&[b'c', 0xE9]);
    bytes
}

#[test]
fn test_invalid_utf8_warns() {
    let mut reader = reader_over(latin1_string_file());
    assert_eq!(reader.read_page().unwrap(), Some(1));
    assert_eq!(
        reader.get_column("s").unwrap(),
        ColumnData::String(vec!["c\u{FFFD}".into()])
    );
    let top = reader.errors().top().unwrap();
    assert_eq!(top.kind, ErrorKind::Message);
    assert_eq!(top.severity, Severity::Warning);
    assert!(top.message.contains("UTF-8"));

    let options = ReaderOptions::default().with_no_warnings(true);
    let mut quiet = SddsReader::from_reader(Cursor::new(latin1_string_file()), options);
    assert_eq!(quiet.read_page().unwrap(), Some(1));
    assert!(quiet.errors().is_empty());
}

struct Broken;

impl Write for Broken {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_io_failure_poisons_writer() {
    let mut writer = SddsWriter::new(Broken, WriterOptions::ascii());
    writer.define_column("x", DataType::F64).unwrap();
    assert!(matches!(writer.write_layout(), Err(SddsError::Io(_))));
    assert!(matches!(
        writer.start_page(None),
        Err(SddsError::InvalidState { .. })
    ));
    assert!(writer.errors().has_fatal());
    writer.terminate(TerminateMode::Release).unwrap();
}

#[test]
fn test_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beam.sdds");
    let mut rng = StdRng::seed_from_u64(42);

    let mut writer = SddsWriter::create(&path, WriterOptions::binary()).unwrap();
    define_everything(&mut writer);
    let expected = write_random_pages(&mut writer, &mut rng);
    writer.terminate(TerminateMode::Release).unwrap();
    drop(writer);

    for use_mmap in [true, false] {
        let options = ReaderOptions::default().with_mmap(use_mmap);
        let mut reader = SddsReader::open(&path, options).unwrap();
        assert_pages(&mut reader, &expected);
        reader.terminate(TerminateMode::Release).unwrap();
    }
}

#[test]
fn test_retained_page_outlives_reader() {
    let page: Page = {
        let mut reader = reader_over(two_columns(WriterOptions::ascii()));
        reader.read_page().unwrap();
        reader.terminate(TerminateMode::RetainPage).unwrap().unwrap()
    };
    assert_eq!(page.page_number(), 1);
    assert_eq!(page.column::<f64>("y").unwrap(), [10.0, 20.0, 30.0]);
}
