//! Chunk lifecycle and persistence tests.
//!
//! Covers the open → sealed transition, on-disk round-trips and checksum
//! verification against real files.

use corsac::{Chunk, Cursor, Record, StoreError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::TempDir;

fn rec(time: u64, flag: u64, value: f64) -> Record {
    Record::new(42, time, flag, value)
}

fn drain(mut cursor: Cursor) -> Vec<Record> {
    let mut out = Vec::new();
    while let Some(r) = cursor.read_next() {
        out.push(r);
    }
    out
}

/// Fills a chunk with a regular series until it seals itself.
fn fill_chunk(capacity: usize) -> Chunk {
    let mut chunk = Chunk::create(capacity, rec(1_000_000, 1, 20.0));
    let mut i = 0u64;
    loop {
        i += 1;
        let r = rec(
            1_000_000 + i * 1000,
            1 + (i % 2),
            20.0 + (i as f64 * 0.1).sin(),
        );
        match chunk.append(r) {
            Ok(()) => {}
            Err(StoreError::BufferFull) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    chunk
}

#[test]
fn test_fill_until_sealed() {
    let chunk = fill_chunk(512);
    assert!(chunk.is_closed());
    assert!(chunk.count() > 0);

    let records = drain(chunk.get_reader().unwrap());
    assert_eq!(records.len(), chunk.count() as usize + 1);
    assert!(records.windows(2).all(|w| w[0].time < w[1].time));
    assert!(records.iter().all(|r| r.id == 42));
}

#[test]
fn test_bigger_capacity_holds_more() {
    let small = fill_chunk(128);
    let large = fill_chunk(1024);
    assert!(large.count() > small.count());
}

#[test]
fn test_persist_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("000042.chunk");

    let chunk = fill_chunk(256);
    let mut file = File::create(&path).unwrap();
    chunk.write_to(&mut file).unwrap();
    file.sync_all().unwrap();
    drop(file);

    let mut file = File::open(&path).unwrap();
    let loaded = Chunk::read_from(&mut file).unwrap();

    assert!(loaded.is_closed());
    assert_eq!(loaded.header(), chunk.header());
    assert_eq!(
        drain(loaded.get_reader().unwrap()),
        drain(chunk.get_reader().unwrap())
    );

    // Metadata filters survive the reload.
    assert!(loaded.check_id(42));
    assert!(!loaded.check_id(43));
    assert!(loaded.check_flag(1));
    assert!(loaded.check_flag(0));
}

#[test]
fn test_open_chunk_resumes_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("open.chunk");

    // Persist a half-filled chunk without sealing it.
    let mut chunk = Chunk::create(512, rec(1_000_000, 1, 20.0));
    for i in 1..=10u64 {
        chunk.append(rec(1_000_000 + i * 1000, 1, 20.0 + i as f64)).unwrap();
    }
    assert!(!chunk.is_closed());
    let mut file = File::create(&path).unwrap();
    chunk.write_to(&mut file).unwrap();
    file.sync_all().unwrap();
    drop(file);

    // Reload it and keep appending where the writer stopped.
    let mut file = File::open(&path).unwrap();
    let mut resumed = Chunk::resume_from(&mut file).unwrap();
    assert!(!resumed.is_closed());
    assert_eq!(resumed.count(), 10);

    for i in 11..=20u64 {
        resumed.append(rec(1_000_000 + i * 1000, 1, 20.0 + i as f64)).unwrap();
    }
    resumed.close();

    let records = drain(resumed.get_reader().unwrap());
    assert_eq!(records.len(), 21);
    assert!(records.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(records[20].value, 40.0);
}

#[test]
fn test_bit_flip_in_payload_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.chunk");

    let chunk = fill_chunk(256);
    let mut file = File::create(&path).unwrap();
    chunk.write_to(&mut file).unwrap();
    drop(file);

    // Flip one bit in the last payload byte.
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::End(-1)).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte).unwrap();
    byte[0] ^= 0x01;
    file.seek(SeekFrom::End(-1)).unwrap();
    file.write_all(&byte).unwrap();
    drop(file);

    let mut file = File::open(&path).unwrap();
    assert!(matches!(
        Chunk::read_from(&mut file),
        Err(StoreError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_truncated_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.chunk");

    let chunk = fill_chunk(256);
    let mut buf = Vec::new();
    chunk.write_to(&mut buf).unwrap();
    buf.truncate(buf.len() / 2);
    std::fs::write(&path, &buf).unwrap();

    let mut file = File::open(&path).unwrap();
    assert!(matches!(
        Chunk::read_from(&mut file),
        Err(StoreError::Io(_))
    ));
}

#[test]
fn test_sealed_chunk_rejects_appends() {
    let mut chunk = Chunk::create(512, rec(1000, 0, 1.0));
    chunk.append(rec(2000, 0, 2.0)).unwrap();
    chunk.close();
    assert!(matches!(
        chunk.append(rec(3000, 0, 3.0)),
        Err(StoreError::BufferFull)
    ));
    // Nothing changed.
    assert_eq!(chunk.count(), 1);
    assert_eq!(drain(chunk.get_reader().unwrap()).len(), 2);
}
