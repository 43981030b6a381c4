//! Delta-of-delta timestamp codec.
//!
//! Timestamps of a monotonic-ish series have near-constant spacing, so the
//! difference between successive deltas is usually tiny. Each appended
//! timestamp is reduced to a signed double-delta `D` and stored in the
//! smallest of four tagged widths:
//!
//! - `-32 <= D < 32`: 1 byte, `10` tag + 6-bit two's complement
//! - `-4096 <= D < 4096`: 2 bytes, `110` tag + 13 bits
//! - `-524288 <= D <= 524287`: 3 bytes, `1110` tag + 20 bits
//! - else: marker byte `0x00` + raw 64-bit `D`
//!
//! The first timestamp is the decompression seed and is not written to the
//! buffer; callers persist it out of band (the chunk stores it as
//! `first.time`).

use crate::codec::buffer::{BitReader, BitWriter};
use crate::error::{Result, StoreError};
use crate::record::Timestamp;

const DELTA_1B_TAG: u8 = 0x80; // 10dd_dddd: 6-bit field below the tag
const DELTA_2B_TAG: u16 = 0xC000; // 110d_dddd dddd_dddd: tag in the high byte, 13-bit field below
const DELTA_3B_TAG: u32 = 0xE0_0000; // 1110_dddd dddd_dddd dddd_dddd: 20-bit field below
const DELTA_BIG_MARKER: u8 = 0x00;

/// Encoder state for delta-of-delta timestamps.
#[derive(Debug, Clone, Copy)]
pub struct DeltaEncoder {
    is_first: bool,
    prev_time: Timestamp,
    prev_delta: i64,
}

impl DeltaEncoder {
    /// Creates an encoder that treats the first appended timestamp as the
    /// out-of-band seed.
    pub fn new() -> Self {
        Self {
            is_first: true,
            prev_time: 0,
            prev_delta: 0,
        }
    }

    /// Creates an encoder already primed with `first`, as if it had been
    /// the first appended timestamp.
    pub fn seeded(first: Timestamp) -> Self {
        Self {
            is_first: false,
            prev_time: first,
            prev_delta: 0,
        }
    }

    /// Appends a timestamp.
    ///
    /// Returns [`StoreError::BufferFull`] without mutating any state when
    /// the buffer lacks room for the chosen width; the caller seals the
    /// chunk.
    pub fn append(&mut self, t: Timestamp, bw: &mut BitWriter<'_>) -> Result<()> {
        if self.is_first {
            self.is_first = false;
            self.prev_time = t;
            self.prev_delta = 0;
            return Ok(());
        }

        let d = (t.wrapping_sub(self.prev_time) as i64).wrapping_sub(self.prev_delta);

        if (-32..32).contains(&d) {
            if bw.free_size() < 1 {
                return Err(StoreError::BufferFull);
            }
            let tag = DELTA_1B_TAG | (d as u8 & 0x3F);
            bw.write_bits(u64::from(tag), 8)?;
        } else if (-4096..4096).contains(&d) {
            if bw.free_size() < 2 {
                return Err(StoreError::BufferFull);
            }
            let v = DELTA_2B_TAG | (d as u16 & 0x1FFF);
            bw.write_bits(u64::from(v), 16)?;
        } else if (-524_288..=524_287).contains(&d) {
            if bw.free_size() < 3 {
                return Err(StoreError::BufferFull);
            }
            let v = DELTA_3B_TAG | (d as u32 & 0xF_FFFF);
            bw.write_bits(u64::from(v), 24)?;
        } else {
            if bw.free_size() < 9 {
                return Err(StoreError::BufferFull);
            }
            bw.write_bits(u64::from(DELTA_BIG_MARKER), 8)?;
            bw.write_bits(d as u64, 64)?;
        }

        self.prev_delta = d;
        self.prev_time = t;
        Ok(())
    }
}

impl Default for DeltaEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder mirroring [`DeltaEncoder`], primed with the out-of-band seed.
#[derive(Debug, Clone, Copy)]
pub struct DeltaDecoder {
    prev_time: Timestamp,
    prev_delta: i64,
}

impl DeltaDecoder {
    /// Creates a decoder primed with the seed timestamp.
    pub fn new(first: Timestamp) -> Self {
        Self {
            prev_time: first,
            prev_delta: 0,
        }
    }

    /// Decodes the next timestamp.
    pub fn read(&mut self, br: &mut BitReader<'_>) -> Result<Timestamp> {
        let tag = br.read_bits(8)? as u8;

        let d = if tag == DELTA_BIG_MARKER {
            br.read_bits(64)? as i64
        } else if tag & 0xC0 == DELTA_1B_TAG {
            let field = u64::from(tag & 0x3F);
            // Explicit arithmetic sign extension of the 6-bit field.
            ((field as i64) << 58) >> 58
        } else if tag & 0xE0 == 0xC0 {
            let lo = br.read_bits(8)?;
            let field = (u64::from(tag & 0x1F) << 8) | lo;
            ((field as i64) << 51) >> 51
        } else if tag & 0xF0 == 0xE0 {
            let lo = br.read_bits(16)?;
            let field = (u64::from(tag & 0x0F) << 16) | lo;
            ((field as i64) << 44) >> 44
        } else {
            return Err(StoreError::CorruptStream(format!(
                "unknown delta tag byte {tag:#04x}"
            )));
        };

        let t = self.prev_time.wrapping_add_signed(d.wrapping_add(self.prev_delta));
        self.prev_delta = d;
        self.prev_time = t;
        Ok(t)
    }
}
