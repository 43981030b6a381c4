//! Core value types: measurements and time ranges.

use crate::error::Result;
use std::io::{Read, Write};

/// Series identifier.
pub type SeriesId = u64;

/// Timestamp in milliseconds.
pub type Timestamp = u64;

/// User-defined flag attached to a record (quality marker, source tag, ...).
pub type Flag = u64;

/// Size of a [`Record`] on the wire, in bytes.
pub const RECORD_WIRE_SIZE: usize = 32;

/// One measurement: `(id, time, flag, value)`.
///
/// Immutable once produced; has no identity beyond its fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Series the record belongs to.
    pub id: SeriesId,
    /// Timestamp in milliseconds.
    pub time: Timestamp,
    /// User-defined flag.
    pub flag: Flag,
    /// Measured value.
    pub value: f64,
}

impl Record {
    /// Creates a record with the given fields.
    pub fn new(id: SeriesId, time: Timestamp, flag: Flag, value: f64) -> Self {
        Self {
            id,
            time,
            flag,
            value,
        }
    }

    /// Writes the record raw (32 bytes, little-endian).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id.to_le_bytes())?;
        writer.write_all(&self.time.to_le_bytes())?;
        writer.write_all(&self.flag.to_le_bytes())?;
        writer.write_all(&self.value.to_bits().to_le_bytes())?;
        Ok(())
    }

    /// Reads a raw record (32 bytes, little-endian).
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; RECORD_WIRE_SIZE];
        reader.read_exact(&mut buf)?;
        let id = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let time = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let flag = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let value = f64::from_bits(u64::from_le_bytes(buf[24..32].try_into().unwrap()));
        Ok(Self {
            id,
            time,
            flag,
            value,
        })
    }
}

/// A closed time interval `[start, end]` in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive).
    pub start: Timestamp,
    /// End timestamp (inclusive).
    pub end: Timestamp,
}

impl TimeRange {
    /// Creates a new time range.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Returns true if the two ranges intersect.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns true if `ts` falls within the range.
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }
}
