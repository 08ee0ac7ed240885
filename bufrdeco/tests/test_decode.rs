mod common;

use common::{BitWriter, MessageSpec, config, write_tables};
use flate2::{Compression, write::GzEncoder};
use libbufrdeco::{Decoder, Error, MessageVersion, Severity, parse, parse_bytes};
use std::io::Write;
use tablelib::FXY;
use test_case::test_case;

fn tables_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path(), 13, true);
    dir
}

#[test_case(3; "edition 3")]
#[test_case(4; "edition 4")]
fn two_element_message(edition: u8) {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    w.put(27315, 16).put(1, 2);
    let bytes = MessageSpec::new(vec!["012101", "002001"], w.bytes())
        .edition(edition)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    assert_eq!(file.message_count(), 1);
    let block = file.message_at(0).unwrap();
    assert_eq!(block.version(), edition);
    assert!(block.notes().is_empty());

    let mut decoder = Decoder::from_message(block, &config(dir.path())).unwrap();
    let mut values = decoder.buffer();
    assert!(decoder.next_subset(&mut values).unwrap());

    assert_eq!(values.len(), 2);
    assert_eq!(values[0].desc, FXY::new(0, 12, 101));
    assert_eq!(values[0].value, Some(273.15));
    assert_eq!(values[0].unit, "K");
    assert_eq!(values[1].value, Some(1.0));
    assert_eq!(values[1].explanation.as_deref(), Some("MANNED"));

    assert!(!decoder.next_subset(&mut values).unwrap());
    assert!(decoder.diagnostics().is_empty());
}

#[test]
fn sequences_expand_in_order() {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    w.put(12, 5).text(b"ABCD").put(4123, 17);
    let bytes = MessageSpec::new(vec!["301091"], w.bytes()).build();

    let file = parse_bytes(&bytes).unwrap();
    let block = file.message_at(0).unwrap();
    let mut decoder = Decoder::from_message(block, &config(dir.path())).unwrap();

    let listing = decoder.tree().listing(Some(&decoder.tables().b));
    assert!(listing.contains("301090"));
    assert!(listing.contains("STATION OR SITE NAME"));

    let results = decoder.decode_all();
    assert_eq!(results.len(), 1);
    let values = results[0].as_ref().unwrap();

    let keys: Vec<String> = values.iter().map(|v| v.desc.key()).collect();
    assert_eq!(keys, vec!["004004", "001015", "007030"]);
    assert_eq!(values[0].value, Some(12.0));
    assert_eq!(values[1].as_str(), Some("ABCD"));
    assert_eq!(values[2].value, Some(12.3));
}

#[test]
fn operators_reach_into_sequences() {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    // 2-01-132 adds 4 bits to the numeric elements of 301091.
    w.put(12, 9).text(b"ABCD").put(4123, 21);
    let bytes = MessageSpec::new(vec!["201132", "301091", "201000"], w.bytes()).build();

    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    let results = decoder.decode_all();
    let values = results[0].as_ref().unwrap();

    assert_eq!(values.len(), 3);
    assert_eq!(values[0].value, Some(12.0));
    assert_eq!(values[1].as_str(), Some("ABCD"));
    assert_eq!(values[2].value, Some(12.3));
}

#[test]
fn plain_subsets_have_their_own_replication() {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    w.put(1, 8).put(100, 16);
    w.put(3, 8).put(100, 16).put(200, 16).put(300, 16);
    let bytes = MessageSpec::new(vec!["101000", "031001", "012101"], w.bytes())
        .subsets(2, false)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    let results: Vec<_> = decoder.decode_all().into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].subset, 0);
    assert_eq!(results[0].len(), 2);
    assert_eq!(results[1].subset, 1);
    assert_eq!(results[1].len(), 4);
    assert_eq!(results[1][3].value, Some(3.0));
}

#[test]
fn compressed_message() {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    w.put(12, 5).put(0, 6);
    w.put(27000, 16).put(5, 6).put(0, 5).put(15, 5).put(31, 5);
    w.text(b"\0\0\0\0").put(4, 6).text(b"AAAA").text(b"BB  ").text(&[0xFF; 4]);
    let bytes = MessageSpec::new(vec!["004004", "012101", "001015"], w.bytes())
        .subsets(3, true)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    let block = file.message_at(0).unwrap();
    assert!(block.is_compressed());

    let mut decoder = Decoder::from_message(block, &config(dir.path())).unwrap();
    let results: Vec<_> = decoder.decode_all().into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(results.len(), 3);

    for (i, values) in results.iter().enumerate() {
        assert_eq!(values.subset, i);
        assert_eq!(values[0].value, Some(12.0));
        assert_eq!(values[0].compressed.unwrap().increment_bits, 0);
    }
    assert_eq!(results[0][1].value, Some(270.0));
    assert_eq!(results[1][1].value, Some(270.15));
    assert!(results[2][1].is_missing());
    assert_eq!(results[0][2].as_str(), Some("AAAA"));
    assert_eq!(results[1][2].as_str(), Some("BB"));
    assert!(results[2][2].is_missing());
}

#[test]
fn compression_flag_selects_the_path() {
    let dir = tables_dir();

    let plain = MessageSpec::new(vec!["004004"], vec![0x60]).build();
    let file = parse_bytes(&plain).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    assert!(matches!(
        decoder.decode_compressed(),
        Err(Error::CompressionMismatch(_))
    ));

    let mut w = BitWriter::new();
    w.put(12, 5).put(0, 6);
    let compressed = MessageSpec::new(vec!["004004"], w.bytes())
        .subsets(2, true)
        .build();
    let file = parse_bytes(&compressed).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    let mut values = decoder.buffer();
    assert!(matches!(
        decoder.next_plain_subset(&mut values),
        Err(Error::CompressionMismatch(_))
    ));
    assert_eq!(decoder.decode_compressed().unwrap().len(), 2);
}

#[test]
fn failed_subset_desynchronizes_the_rest() {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    // An all-ones factor asks for 255 temperatures that are not there.
    w.put(0xFF, 8).put(0, 16);
    let bytes = MessageSpec::new(vec!["101000", "031001", "012101"], w.bytes())
        .subsets(3, false)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    let results = decoder.decode_all();

    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Err(Error::BitOverrun { .. })));
    assert!(matches!(results[1], Err(Error::Desynchronized(1))));
    assert!(matches!(results[2], Err(Error::Desynchronized(2))));
    assert!(
        decoder
            .diagnostics()
            .entries()
            .iter()
            .any(|d| d.severity == Severity::Error && d.message.starts_with("subset 0"))
    );
}

#[test]
fn short_delayed_replication() {
    let dir = tables_dir();
    let mut w = BitWriter::new();
    w.put(1, 1).put(12, 5).put(0, 1);
    let bytes = MessageSpec::new(vec!["101000", "031000", "004004"], w.bytes())
        .subsets(2, false)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    let mut values = decoder.buffer();

    assert!(decoder.next_subset(&mut values).unwrap());
    assert_eq!(values.len(), 2);
    let factor = values.find(&FXY::new(0, 31, 0)).unwrap();
    assert!(!factor.is_missing());
    assert_eq!(factor.value, Some(1.0));
    assert_eq!(values.find(&FXY::new(0, 4, 4)).unwrap().value, Some(12.0));

    assert!(decoder.next_subset(&mut values).unwrap());
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, Some(0.0));
    assert!(values.find(&FXY::new(0, 4, 4)).is_none());
}

#[test]
fn data_changes_values_not_structure() {
    let dir = tables_dir();
    let decode = |temperature: u64, station: u64| {
        let mut w = BitWriter::new();
        w.put(temperature, 16).put(station, 2);
        let bytes = MessageSpec::new(vec!["012101", "002001"], w.bytes()).build();
        let file = parse_bytes(&bytes).unwrap();
        let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
        let mut values = decoder.buffer();
        assert!(decoder.next_subset(&mut values).unwrap());
        values
    };

    let a = decode(27315, 0);
    let b = decode(28000, 1);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.desc, y.desc);
        assert_eq!(x.name, y.name);
        assert_eq!(x.unit, y.unit);
        assert_ne!(x.value, y.value);
    }
    assert_eq!(a[1].explanation.as_deref(), Some("AUTOMATIC"));
    assert_eq!(b[1].explanation.as_deref(), Some("MANNED"));
}

#[test]
fn falls_back_to_an_older_master_version() {
    let dir = tables_dir();
    let bytes = MessageSpec::new(vec!["004004"], vec![0x60])
        .master_version(14)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    assert!(
        decoder
            .diagnostics()
            .entries()
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("using version 13"))
    );

    let results = decoder.decode_all();
    assert_eq!(results[0].as_ref().unwrap()[0].value, Some(12.0));
}

#[test]
fn local_centre_uses_wmo_tables() {
    let dir = tables_dir();
    let bytes = MessageSpec::new(vec!["004004"], vec![0x60])
        .centre(98)
        .build();

    let file = parse_bytes(&bytes).unwrap();
    let decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();
    assert!(!decoder.diagnostics().is_empty());
}

#[test]
fn table_c_is_optional() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path(), 13, false);

    let mut w = BitWriter::new();
    w.put(1, 2);
    let bytes = MessageSpec::new(vec!["002001"], w.bytes()).build();
    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();

    assert!(decoder.tables().c.is_none());
    assert!(
        decoder
            .diagnostics()
            .entries()
            .iter()
            .any(|d| d.message.contains("Table C unavailable"))
    );

    let results = decoder.decode_all();
    let values = results[0].as_ref().unwrap();
    assert_eq!(values[0].value, Some(1.0));
    assert!(values[0].explanation.is_none());
}

#[test]
fn missing_tables() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = MessageSpec::new(vec!["004004"], vec![0x60]).build();
    let file = parse_bytes(&bytes).unwrap();

    assert!(matches!(
        Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())),
        Err(Error::TableNotFound(_))
    ));
}

#[test]
fn unknown_sequence() {
    let dir = tables_dir();
    let bytes = MessageSpec::new(vec!["301999"], vec![0]).build();
    let file = parse_bytes(&bytes).unwrap();

    assert!(matches!(
        Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())),
        Err(Error::UnknownSequence(_))
    ));
}

#[test]
fn implausible_date_is_reported() {
    let dir = tables_dir();
    let bytes = MessageSpec::new(vec!["004004"], vec![0x60]).month(13).build();
    let file = parse_bytes(&bytes).unwrap();
    let decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();

    assert!(
        decoder
            .diagnostics()
            .entries()
            .iter()
            .any(|d| d.message.contains("month is 13"))
    );
}

#[test]
fn unused_trailing_bits_are_reported() {
    let dir = tables_dir();
    let bytes = MessageSpec::new(vec!["004004"], vec![0x60, 0, 0, 0, 0]).build();
    let file = parse_bytes(&bytes).unwrap();
    let mut decoder = Decoder::from_message(file.message_at(0).unwrap(), &config(dir.path())).unwrap();

    assert_eq!(decoder.decode_all().len(), 1);
    let entries = decoder.diagnostics().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Info);
    assert!(entries[0].message.contains("35 unused bits"));
}

#[test]
fn optional_section_is_skipped() {
    let dir = tables_dir();
    let bytes = MessageSpec::new(vec!["004004"], vec![0x60])
        .section2(vec![1, 2, 3, 4])
        .build();
    let file = parse_bytes(&bytes).unwrap();
    let block = file.message_at(0).unwrap();
    assert_eq!(block.section2().unwrap().data, vec![1, 2, 3, 4]);

    let mut decoder = Decoder::from_message(block, &config(dir.path())).unwrap();
    assert_eq!(decoder.decode_all()[0].as_ref().unwrap()[0].value, Some(12.0));
}

fn bulletin() -> Vec<u8> {
    let mut out = b"\x01\r\r\n123\r\r\nISMD01 EGRR 151200 RRA\r\r\n".to_vec();
    out.extend(MessageSpec::new(vec!["004004"], vec![0x60]).build());
    out.extend(b"\r\r\n\x03\x01\r\r\n456\r\r\nIUKN01 LFPW 151230\r\r\n");
    let mut w = BitWriter::new();
    w.put(27315, 16).put(0, 2);
    out.extend(MessageSpec::new(vec!["012101", "002001"], w.bytes()).edition(3).build());
    out.extend(b"\r\r\n\x03");
    out
}

fn check_bulletin(file: &libbufrdeco::BUFRFile, dir: &std::path::Path) {
    assert_eq!(file.message_count(), 2);

    let first = file.message_at(0).unwrap();
    let gts = first.gts().unwrap();
    assert_eq!(gts.ttaaii, "ISMD01");
    assert_eq!(gts.cccc, "EGRR");
    assert_eq!(gts.bbb.as_deref(), Some("RRA"));
    assert_eq!(gts.data_type(), "IS");

    let second = file.message_at(1).unwrap();
    assert_eq!(second.gts().unwrap().cccc, "LFPW");
    assert!(second.offset() > first.offset());

    let mut decoder = Decoder::from_message(second, &config(dir)).unwrap();
    let values = decoder.decode_all().remove(0).unwrap();
    assert_eq!(values[1].explanation.as_deref(), Some("AUTOMATIC"));
}

#[test]
fn gts_bulletin_file() {
    let dir = tables_dir();
    let path = dir.path().join("bulletin.bin");
    std::fs::write(&path, bulletin()).unwrap();

    let file = parse(&path).unwrap();
    check_bulletin(&file, dir.path());
}

#[test]
fn gzip_input() {
    let dir = tables_dir();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&bulletin()).unwrap();
    let gz = encoder.finish().unwrap();

    let path = dir.path().join("bulletin.bin.gz");
    std::fs::write(&path, &gz).unwrap();
    check_bulletin(&parse(&path).unwrap(), dir.path());
    check_bulletin(&parse_bytes(&gz).unwrap(), dir.path());
}

#[test]
fn cached_tables_are_shared() {
    let dir = tables_dir();
    let mut config = config(dir.path());
    config.tables.use_cache = true;

    let bytes = MessageSpec::new(vec!["004004"], vec![0x60]).build();
    let file = parse_bytes(&bytes).unwrap();
    let block = file.message_at(0).unwrap();

    let first = Decoder::from_message(block, &config).unwrap();
    let second = Decoder::from_message(block, &config).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first.tables().b.0, &second.tables().b.0));
    assert!(tablelib::cache::cached(dir.path().join(format!("B{:03}{:05}{:05}{:03}{:03}.TXT", 0, 0, 0, 13, 0))).is_some());
}
