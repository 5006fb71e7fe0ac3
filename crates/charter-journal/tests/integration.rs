use charter_journal::{FrameKind, JournalReader, JournalWriter, ReadMode, WriteOptions};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn make_event_record(sequence: u64) -> Value {
    json!({
        "sequence": sequence.to_string(),
        "event_type": "domain.note",
        "payload": "e30",
        "authority_timestamp": "2026-01-01T00:00:00Z",
        "prev_hash": { "alg": "sha-256", "b64": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA" },
    })
}

#[test]
fn test_write_read_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("ledger.chj");

    {
        let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
        writer.append_json(FrameKind::Event, &make_event_record(1)).unwrap();
        writer
            .append_json(FrameKind::Control, &json!({"op": "head", "sequence": "1"}))
            .unwrap();
        writer.finish().unwrap();
    }

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    let (kind, first) = reader.read_json().unwrap().unwrap();
    assert_eq!(kind, FrameKind::Event);
    assert_eq!(first["sequence"], "1");

    let (kind, second) = reader.read_json().unwrap().unwrap();
    assert_eq!(kind, FrameKind::Control);
    assert_eq!(second["op"], "head");

    assert!(reader.read_json().unwrap().is_none());
    assert!(!reader.has_trailing_bytes());
}

#[test]
fn test_append_to_existing() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("ledger.chj");

    {
        let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
        writer.append_json(FrameKind::Event, &make_event_record(1)).unwrap();
        writer.finish().unwrap();
    }
    {
        let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
        writer.append_json(FrameKind::Event, &make_event_record(2)).unwrap();
        writer.finish().unwrap();
    }

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    let mut sequences = Vec::new();
    while let Some((_, record)) = reader.read_json().unwrap() {
        sequences.push(record["sequence"].as_str().unwrap().to_string());
    }
    assert_eq!(sequences, vec!["1", "2"]);
}

#[test]
fn test_empty_journal_has_only_header() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("ledger.chj");

    JournalWriter::open(&journal_path, WriteOptions::default())
        .unwrap()
        .finish()
        .unwrap();

    assert_eq!(fs::metadata(&journal_path).unwrap().len(), 16);
    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    assert!(reader.read_json().unwrap().is_none());
}

#[test]
fn test_unknown_frame_kinds_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("ledger.chj");

    {
        let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
        writer.append_raw(FrameKind::Unknown(0x7F), b"opaque").unwrap();
        writer
            .append_json(FrameKind::HaltState, &json!({"is_halted": true}))
            .unwrap();
        writer.finish().unwrap();
    }

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    let (kind, record) = reader.read_json().unwrap().unwrap();
    assert_eq!(kind, FrameKind::HaltState);
    assert_eq!(record["is_halted"], true);
}

#[test]
fn test_reject_garbage_file() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("ledger.chj");
    fs::write(&journal_path, b"definitely not a journal file").unwrap();

    assert!(JournalReader::open(&journal_path, ReadMode::Strict).is_err());
    assert!(JournalWriter::open(&journal_path, WriteOptions::default()).is_err());
}
