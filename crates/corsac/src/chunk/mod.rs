//! Compressed chunk container.
//!
//! A chunk is a fixed-size, append-only block holding one bounded run of
//! records for a single series, compressed with the record codec. The
//! header carries enough metadata (time range, flag bloom, checksum) for
//! callers to filter and verify chunks without decompressing them.
//!
//! ## Wire layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Header (116 bytes, little-endian)                           │
//! │  - Series id: u64                                            │
//! │  - Record count (excluding seed): u32                        │
//! │  - Min timestamp: u64                                        │
//! │  - Max timestamp: u64                                        │
//! │  - First record, raw (decompression seed): 32 bytes          │
//! │  - Last record, raw (current-value queries): 32 bytes        │
//! │  - Flag bloom filter: u64                                    │
//! │  - Payload size: u32                                         │
//! │  - Write cursor (bit offset, open-chunk resumption): u32     │
//! │  - Payload CRC32 (valid once sealed): u32                    │
//! │  - Sorted marker: u8                                         │
//! │  - Chunk kind: u8                                            │
//! │  - Reserved: 2 bytes                                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Payload (`payload_size` bytes)                              │
//! │  - One bit-buffer region, written back to front              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A chunk starts *open*: the seed record is stored raw in the header and
//! primes the codec, then [`Chunk::append`] compresses records until the
//! payload runs out. The append that no longer fits seals the chunk
//! (checksum computed, further appends rejected). Sealed chunks are
//! immutable and read through [`Chunk::get_reader`].

use crate::codec::{BitReader, BitWriter, RecordDecoder, RecordEncoder};
use crate::cursor::{Cursor, SingleCursor};
use crate::error::{Result, StoreError};
use crate::record::{Flag, Record, SeriesId, TimeRange, Timestamp};
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Chunk header size in bytes.
pub const HEADER_SIZE: usize = 116;

/// Largest payload a chunk can carry (the write cursor is a u32 bit offset).
pub const MAX_PAYLOAD_SIZE: usize = (u32::MAX / 8) as usize;

/// Codec variant stored in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChunkKind {
    /// Record-codec compressed payload (the only variant today).
    #[default]
    Compressed = 1,
}

impl ChunkKind {
    /// Creates a ChunkKind from a u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Compressed),
            _ => None,
        }
    }
}

/// Approximate membership filter over the flags seen by one chunk.
///
/// A single 64-bit OR-filter: inserting a flag ORs its hash into the word,
/// probing checks that all hash bits are set. May false-positive, never
/// false-negatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagBloom(u64);

impl FlagBloom {
    /// Creates an empty filter.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Restores a filter from its raw bits.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw filter bits.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Adds a flag to the filter.
    pub fn insert(&mut self, flag: Flag) {
        self.0 |= Self::hash(flag);
    }

    /// Checks whether a flag might have been inserted.
    pub fn maybe_contains(self, flag: Flag) -> bool {
        let h = Self::hash(flag);
        self.0 & h == h
    }

    fn hash(flag: Flag) -> u64 {
        xxhash_rust::xxh64::xxh64(&flag.to_le_bytes(), 0)
    }
}

/// Chunk header (116 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkHeader {
    /// Series the chunk belongs to.
    pub id: SeriesId,
    /// Records appended after the seed.
    pub count: u32,
    /// Minimum timestamp in the chunk (including the seed).
    pub min_time: Timestamp,
    /// Maximum timestamp in the chunk (including the seed).
    pub max_time: Timestamp,
    /// First record, stored raw as the decompression seed.
    pub first: Record,
    /// Last appended record, kept for fast current-value queries.
    pub last: Record,
    /// Approximate membership filter over all flags seen.
    pub flag_bloom: FlagBloom,
    /// Payload region size in bytes.
    pub payload_size: u32,
    /// Bit cursor where the next write would start. Persisting it lets an
    /// open chunk be written out and resumed later.
    pub write_cursor: u32,
    /// CRC32 over the whole payload region, valid only once sealed.
    pub checksum: u32,
    /// False when records were appended out of timestamp order.
    pub is_sorted: bool,
    /// Codec variant of the payload.
    pub kind: ChunkKind,
}

impl ChunkHeader {
    /// Writes the header using little-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id.to_le_bytes())?;
        writer.write_all(&self.count.to_le_bytes())?;
        writer.write_all(&self.min_time.to_le_bytes())?;
        writer.write_all(&self.max_time.to_le_bytes())?;
        self.first.write_to(writer)?;
        self.last.write_to(writer)?;
        writer.write_all(&self.flag_bloom.bits().to_le_bytes())?;
        writer.write_all(&self.payload_size.to_le_bytes())?;
        writer.write_all(&self.write_cursor.to_le_bytes())?;
        writer.write_all(&self.checksum.to_le_bytes())?;
        writer.write_all(&[u8::from(self.is_sorted), self.kind as u8])?;
        // Reserved (2 bytes)
        writer.write_all(&[0u8; 2])?;
        Ok(())
    }

    /// Reads a header using little-endian byte order.
    ///
    /// Fails with [`StoreError::UnsupportedKind`] on an unknown kind byte.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        let id = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let count = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let min_time = u64::from_le_bytes(buf[12..20].try_into().unwrap());
        let max_time = u64::from_le_bytes(buf[20..28].try_into().unwrap());
        let first = Record::read_from(&mut &buf[28..60])?;
        let last = Record::read_from(&mut &buf[60..92])?;
        let flag_bloom = FlagBloom::from_bits(u64::from_le_bytes(buf[92..100].try_into().unwrap()));
        let payload_size = u32::from_le_bytes(buf[100..104].try_into().unwrap());
        let write_cursor = u32::from_le_bytes(buf[104..108].try_into().unwrap());
        let checksum = u32::from_le_bytes(buf[108..112].try_into().unwrap());
        let is_sorted = buf[112] != 0;
        let kind = ChunkKind::from_u8(buf[113]).ok_or(StoreError::UnsupportedKind(buf[113]))?;
        // Reserved (2 bytes) - ignored

        Ok(Self {
            id,
            count,
            min_time,
            max_time,
            first,
            last,
            flag_bloom,
            payload_size,
            write_cursor,
            checksum,
            is_sorted,
            kind,
        })
    }
}

/// A bounded, append-only, eventually-sealed compressed block of records
/// for one series.
#[derive(Debug)]
pub struct Chunk {
    header: ChunkHeader,
    payload: Vec<u8>,
    encoder: RecordEncoder,
    closed: bool,
}

impl Chunk {
    /// Creates an open chunk with a payload of `capacity` bytes, seeded
    /// with `seed`. The seed primes the codec and is stored raw in the
    /// header; it does not consume payload space and is not counted.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` exceeds [`MAX_PAYLOAD_SIZE`], the largest
    /// region the header's u32 bit cursor can address.
    pub fn create(capacity: usize, seed: Record) -> Self {
        assert!(capacity <= MAX_PAYLOAD_SIZE);
        let payload = vec![0u8; capacity];
        let encoder = RecordEncoder::seeded(&seed);

        let mut flag_bloom = FlagBloom::empty();
        flag_bloom.insert(seed.flag);

        Self {
            header: ChunkHeader {
                id: seed.id,
                count: 0,
                min_time: seed.time,
                max_time: seed.time,
                first: seed,
                last: seed,
                flag_bloom,
                payload_size: capacity as u32,
                write_cursor: (capacity * 8) as u32,
                checksum: 0,
                is_sorted: true,
                kind: ChunkKind::Compressed,
            },
            payload,
            encoder,
            closed: false,
        }
    }

    /// Appends a record.
    ///
    /// On success the header metadata (count, time range, last record,
    /// flag bloom) is updated. When the record no longer fits, the chunk
    /// seals itself and [`StoreError::BufferFull`] is returned; the caller
    /// starts a new chunk and must not retry on this one. Out-of-order
    /// timestamps are accepted and clear the sorted marker.
    pub fn append(&mut self, rec: Record) -> Result<()> {
        if self.closed {
            return Err(StoreError::BufferFull);
        }

        let mut bw = BitWriter::resume(&mut self.payload, self.header.write_cursor as usize)?;
        match self.encoder.append(&rec, &mut bw) {
            Ok(()) => {
                self.header.write_cursor = bw.position() as u32;
                self.header.count += 1;
                self.header.min_time = self.header.min_time.min(rec.time);
                self.header.max_time = self.header.max_time.max(rec.time);
                if rec.time < self.header.last.time {
                    self.header.is_sorted = false;
                }
                self.header.last = rec;
                self.header.flag_bloom.insert(rec.flag);
                Ok(())
            }
            Err(StoreError::BufferFull) => {
                self.close();
                Err(StoreError::BufferFull)
            }
            Err(e) => Err(e),
        }
    }

    /// Seals the chunk: computes the payload checksum and rejects further
    /// appends. Idempotent; the checksum is computed once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.header.checksum = crc32fast::hash(&self.payload);
        self.closed = true;
        debug!(
            id = self.header.id,
            count = self.header.count,
            min_time = self.header.min_time,
            max_time = self.header.max_time,
            "sealed chunk"
        );
    }

    /// Returns true once the chunk is sealed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the chunk header.
    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    /// Series id of the chunk.
    pub fn id(&self) -> SeriesId {
        self.header.id
    }

    /// Records appended after the seed.
    pub fn count(&self) -> u32 {
        self.header.count
    }

    /// Covered time interval (inclusive).
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.header.min_time, self.header.max_time)
    }

    /// Exact check whether `id` is the chunk's series.
    ///
    /// One chunk holds one series, so this never false-positives (the
    /// approximate-membership contract allows an exact answer).
    pub fn check_id(&self, id: SeriesId) -> bool {
        self.header.id == id
    }

    /// Approximate check whether any record carries `flag`. False
    /// positives are possible, false negatives are not. Flag 0 matches
    /// everything.
    pub fn check_flag(&self, flag: Flag) -> bool {
        flag == 0 || self.header.flag_bloom.maybe_contains(flag)
    }

    /// Decodes the chunk into a [`SingleCursor`] replaying the seed and
    /// all appended records in ascending time order.
    ///
    /// Decode errors propagate unchanged. If records were appended out of
    /// order, they are stable-sorted by time before being exposed; readers
    /// never see storage-order timestamps out of order.
    pub fn get_reader(&self) -> Result<Cursor> {
        let mut records = Vec::with_capacity(self.header.count as usize + 1);
        records.push(self.header.first);

        let mut br = BitReader::new(&self.payload);
        let mut dec = RecordDecoder::new(&self.header.first);
        for _ in 0..self.header.count {
            records.push(dec.read(&mut br)?);
        }

        if !self.header.is_sorted {
            records.sort_by_key(|r| r.time);
        }

        Ok(Cursor::Single(SingleCursor::new(records)))
    }

    /// Writes the chunk (header + payload).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.write_to(writer)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    /// Reads a sealed chunk back and verifies the payload checksum.
    ///
    /// Chunks handed to a lower storage tier are sealed, so the checksum
    /// must match; a mismatch is surfaced to the owning tier, never
    /// skipped. An image written out while still open has no valid
    /// checksum and belongs to [`Chunk::resume_from`] instead.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let header = ChunkHeader::read_from(reader)?;
        let mut payload = vec![0u8; header.payload_size as usize];
        reader.read_exact(&mut payload)?;

        let actual = crc32fast::hash(&payload);
        if actual != header.checksum {
            warn!(
                id = header.id,
                expected = header.checksum,
                actual,
                "chunk payload failed checksum verification"
            );
            return Err(StoreError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        Ok(Self {
            header,
            payload,
            encoder: RecordEncoder::new(),
            closed: true,
        })
    }

    /// Restores an open chunk that was written out mid-fill, so appends
    /// can continue where they left off.
    ///
    /// An open chunk has no checksum yet; integrity is checked by replay
    /// instead. The `count` stored records are decoded and re-encoded
    /// from the seed, which rebuilds the codec state and must land the
    /// write cursor exactly where the header says writing stopped.
    pub fn resume_from<R: Read>(reader: &mut R) -> Result<Self> {
        let header = ChunkHeader::read_from(reader)?;
        if header.payload_size as usize > MAX_PAYLOAD_SIZE {
            return Err(StoreError::CorruptStream(format!(
                "payload size {} exceeds the addressable region",
                header.payload_size
            )));
        }
        let mut payload = vec![0u8; header.payload_size as usize];
        reader.read_exact(&mut payload)?;

        let mut br = BitReader::new(&payload);
        let mut dec = RecordDecoder::new(&header.first);
        let mut records = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            records.push(dec.read(&mut br)?);
        }

        let mut chunk = Self::create(header.payload_size as usize, header.first);
        for rec in records {
            chunk.append(rec)?;
        }
        if chunk.header.write_cursor != header.write_cursor {
            return Err(StoreError::CorruptStream(format!(
                "replayed write cursor {} does not match stored cursor {}",
                chunk.header.write_cursor, header.write_cursor
            )));
        }
        debug!(
            id = chunk.header.id,
            count = chunk.header.count,
            "resumed open chunk"
        );
        Ok(chunk)
    }
}
