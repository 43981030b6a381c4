//! Record compression codec.
//!
//! A chunk payload is one [`buffer::BitWriter`] region shared by three
//! field codecs, applied in a fixed order per record:
//!
//! 1. [`delta::DeltaEncoder`] — delta-of-delta timestamps
//! 2. [`xor::XorEncoder`] — XOR-compressed values
//! 3. [`flag::FlagEncoder`] — same-or-varint flags
//!
//! The first record of a stream is the *seed*: all three codecs record it
//! as their initial state and nothing is written to the buffer. Callers
//! persist the seed out of band (the chunk keeps it raw in its header).
//!
//! [`RecordEncoder::append`] is atomic: if any field codec runs out of
//! space, the buffer cursor and all codec states are rolled back, so the
//! stream never contains a partial record.

pub mod buffer;
pub mod delta;
pub mod flag;
pub mod xor;

pub use buffer::{BitReader, BitWriter};
pub use delta::{DeltaDecoder, DeltaEncoder};
pub use flag::{FlagDecoder, FlagEncoder};
pub use xor::{XorDecoder, XorEncoder};

use crate::error::Result;
use crate::record::Record;

/// Compressing writer for `(time, value, flag)` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordEncoder {
    time: DeltaEncoder,
    value: XorEncoder,
    flag: FlagEncoder,
}

impl RecordEncoder {
    /// Creates an encoder. The first appended record becomes the seed.
    pub fn new() -> Self {
        Self {
            time: DeltaEncoder::new(),
            value: XorEncoder::new(),
            flag: FlagEncoder::new(),
        }
    }

    /// Creates an encoder already primed with `seed`, as if it had been
    /// the first appended record.
    pub fn seeded(seed: &Record) -> Self {
        Self {
            time: DeltaEncoder::seeded(seed.time),
            value: XorEncoder::seeded(seed.value),
            flag: FlagEncoder::seeded(seed.flag),
        }
    }

    /// Appends one record, encoding time, value and flag in order against
    /// the shared buffer.
    ///
    /// Fails with [`crate::StoreError::BufferFull`] when any field does not
    /// fit; the buffer and the encoder are left exactly as before the call.
    pub fn append(&mut self, rec: &Record, bw: &mut BitWriter<'_>) -> Result<()> {
        let checkpoint = bw.position();
        let saved = *self;

        let outcome = self
            .time
            .append(rec.time, bw)
            .and_then(|()| self.value.append(rec.value, bw))
            .and_then(|()| self.flag.append(rec.flag, bw));

        if outcome.is_err() {
            *self = saved;
            bw.rewind(checkpoint);
        }
        outcome
    }
}

/// Decompressing reader for `(time, value, flag)` records.
///
/// Decoded records carry the seed's series id; a chunk holds exactly one
/// series.
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder {
    id: u64,
    time: DeltaDecoder,
    value: XorDecoder,
    flag: FlagDecoder,
}

impl RecordDecoder {
    /// Creates a decoder primed with the seed record.
    pub fn new(seed: &Record) -> Self {
        Self {
            id: seed.id,
            time: DeltaDecoder::new(seed.time),
            value: XorDecoder::new(seed.value),
            flag: FlagDecoder::new(seed.flag),
        }
    }

    /// Decodes the next record in the same fixed field order.
    pub fn read(&mut self, br: &mut BitReader<'_>) -> Result<Record> {
        let time = self.time.read(br)?;
        let value = self.value.read(br)?;
        let flag = self.flag.read(br)?;
        Ok(Record {
            id: self.id,
            time,
            flag,
            value,
        })
    }
}
