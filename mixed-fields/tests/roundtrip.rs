//! Tests for writing items and reading them back.

use mixed_fields::{
    Error, Field, MixedFieldsReader, MixedFieldsWriter, DEFAULT_METADATA, END_BYTE, START_BYTE,
};
use std::path::PathBuf;
use tempfile::TempDir;

const ITEMS: [&[u8]; 3] = [b"Spam", b"And eggs!", b"\x01\x02\x03\x04"];

/// Helper to create a scratch dir + file path
fn scratch() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.mxf");
    (temp_dir, path)
}

fn write_items(path: &PathBuf, items: &[&[u8]]) {
    let mut writer = MixedFieldsWriter::open(path).unwrap();
    for item in items {
        writer.write_item(item).unwrap();
    }
    writer.close().unwrap();
}

fn read_all(path: &PathBuf) -> Vec<Vec<u8>> {
    let mut reader = MixedFieldsReader::open(path).unwrap();
    reader.items().collect::<Result<Vec<_>, _>>().unwrap()
}

#[test]
fn items_come_back_in_order() {
    let (_dir, path) = scratch();
    write_items(&path, &ITEMS);

    let mut reader = MixedFieldsReader::open(&path).unwrap();
    for item in ITEMS {
        assert_eq!(reader.read_item().unwrap(), item);
    }
    // End of stream is sticky
    for _ in 0..3 {
        assert_eq!(reader.read_item().unwrap(), Vec::<u8>::new());
        assert_eq!(reader.next_item().unwrap(), None);
    }
    assert!(reader.is_exhausted());
    assert_eq!(reader.items_read(), 3);
}

#[test]
fn exact_byte_layout() {
    let (_dir, path) = scratch();
    write_items(&path, &[b"Spam"]);

    let mut expected = vec![START_BYTE];
    expected.extend_from_slice(b"Mixd");
    expected.push(END_BYTE);
    expected.push(START_BYTE);
    expected.extend_from_slice(b"sMDT");
    expected.push(8);
    expected.extend_from_slice(&DEFAULT_METADATA);
    expected.push(END_BYTE);
    expected.push(START_BYTE);
    expected.extend_from_slice(b"sDAT");
    expected.push(4);
    expected.extend_from_slice(b"Spam");
    expected.push(END_BYTE);
    expected.push(START_BYTE);
    expected.extend_from_slice(b"xEOF");
    expected.push(END_BYTE);

    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn empty_items_are_not_end_of_stream() {
    let (_dir, path) = scratch();
    write_items(&path, &[b"", b"x", b""]);

    let mut reader = MixedFieldsReader::open(&path).unwrap();
    assert_eq!(reader.next_item().unwrap(), Some(vec![]));
    assert_eq!(reader.next_item().unwrap(), Some(b"x".to_vec()));
    assert_eq!(reader.next_item().unwrap(), Some(vec![]));
    assert_eq!(reader.next_item().unwrap(), None);
}

#[test]
fn large_item_roundtrip() {
    let (_dir, path) = scratch();
    let big: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    write_items(&path, &[big.as_slice(), b"tail"]);

    assert_eq!(read_all(&path), vec![big, b"tail".to_vec()]);
}

#[test]
fn close_twice_writes_one_eof() {
    let (_dir, path) = scratch();
    let mut writer = MixedFieldsWriter::open(&path).unwrap();
    writer.write_item(b"Spam").unwrap();
    writer.close().unwrap();
    let len = std::fs::metadata(&path).unwrap().len();

    writer.close().unwrap();
    assert!(writer.is_closed());
    drop(writer);

    assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    let expected = Field::header().encoded_len()
        + Field::metadata(DEFAULT_METADATA.to_vec()).encoded_len()
        + Field::data(b"Spam".to_vec()).encoded_len()
        + Field::eof().encoded_len();
    assert_eq!(len, expected);
    assert_eq!(read_all(&path), vec![b"Spam".to_vec()]);
}

#[test]
fn write_after_close_fails() {
    let (_dir, path) = scratch();
    let mut writer = MixedFieldsWriter::open(&path).unwrap();
    writer.close().unwrap();
    assert!(matches!(writer.write_item(b"late"), Err(Error::Closed)));
}

#[test]
fn drop_closes_the_file() {
    let (_dir, path) = scratch();
    {
        let mut writer = MixedFieldsWriter::open(&path).unwrap();
        for item in ITEMS {
            writer.write_item(item).unwrap();
        }
    }
    assert_eq!(read_all(&path), ITEMS.iter().map(|i| i.to_vec()).collect::<Vec<_>>());
}

#[test]
fn closing_without_items_gives_empty_container() {
    let (_dir, path) = scratch();
    let mut writer = MixedFieldsWriter::open(&path).unwrap();
    assert!(path.exists());
    writer.close().unwrap();

    let mut reader = MixedFieldsReader::open(&path).unwrap();
    assert_eq!(reader.metadata().as_bytes(), &DEFAULT_METADATA);
    assert_eq!(reader.next_item().unwrap(), None);
}

#[test]
fn custom_metadata_is_stored_verbatim() {
    let (_dir, path) = scratch();
    let mut writer = MixedFieldsWriter::open_with_metadata(&path, b"opaque blob".to_vec()).unwrap();
    writer.write_item(b"Spam").unwrap();
    writer.close().unwrap();

    let reader = MixedFieldsReader::open(&path).unwrap();
    assert_eq!(reader.metadata().as_bytes(), b"opaque blob");
}

#[test]
fn counters_track_the_session() {
    let (_dir, path) = scratch();
    let mut writer = MixedFieldsWriter::open(&path).unwrap();
    assert_eq!(writer.bytes_written(), 0);
    writer.write_item(b"Spam").unwrap();
    writer.write_item(b"").unwrap();
    assert_eq!(writer.items_written(), 2);
    writer.close().unwrap();

    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(writer.bytes_written(), len);
}

#[test]
fn append_to_closed_file() {
    let (_dir, path) = scratch();
    write_items(&path, &[b"first"]);

    let mut writer = MixedFieldsWriter::open_with_metadata(&path, b"ignored".to_vec()).unwrap();
    // Existing metadata wins
    assert_eq!(writer.metadata().as_bytes(), &DEFAULT_METADATA);
    writer.write_item(b"second").unwrap();
    writer.close().unwrap();

    assert_eq!(read_all(&path), vec![b"first".to_vec(), b"second".to_vec()]);

    let bytes = std::fs::read(&path).unwrap();
    let eof_count = bytes.windows(4).filter(|w| *w == b"xEOF").count();
    assert_eq!(eof_count, 1);
}

#[test]
fn append_to_unfinished_file() {
    let (_dir, path) = scratch();
    write_items(&path, &[b"first"]);

    // Cut off the end-of-file field, as if the writer never closed
    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - Field::eof().encoded_len()).unwrap();
    drop(file);

    write_items(&path, &[b"second"]);
    assert_eq!(read_all(&path), vec![b"first".to_vec(), b"second".to_vec()]);
}

#[test]
fn reopen_without_writing_keeps_file_valid() {
    let (_dir, path) = scratch();
    write_items(&path, &ITEMS);
    let before = std::fs::read(&path).unwrap();

    MixedFieldsWriter::open(&path).unwrap().close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn reader_close_is_idempotent() {
    let (_dir, path) = scratch();
    write_items(&path, &ITEMS);

    let mut reader = MixedFieldsReader::open(&path).unwrap();
    assert_eq!(reader.read_item().unwrap(), ITEMS[0]);
    reader.close();
    reader.close();
    assert!(matches!(reader.next_item(), Err(Error::Closed)));
}

#[test]
fn reader_close_after_end_of_file() {
    let (_dir, path) = scratch();
    write_items(&path, &ITEMS);

    let mut reader = MixedFieldsReader::open(&path).unwrap();
    assert_eq!(reader.items().count(), ITEMS.len());
    assert_eq!(reader.next_item().unwrap(), None);
    reader.close();
    assert!(matches!(reader.next_item(), Err(Error::Closed)));
    assert!(matches!(reader.read_item(), Err(Error::Closed)));
}

#[test]
fn iterate_by_reference() {
    let (_dir, path) = scratch();
    write_items(&path, &ITEMS);

    let mut reader = mixed_fields::open_read(&path).unwrap();
    let mut count = 0;
    for item in &mut reader {
        assert_eq!(item.unwrap(), ITEMS[count]);
        count += 1;
    }
    assert_eq!(count, ITEMS.len());
    assert!(reader.items().next().is_none());
}
