//! XOR codec for 64-bit floating point values.
//!
//! Successive samples of one series usually share sign, exponent and most
//! mantissa bits, so the XOR of their IEEE-754 bit patterns is a short run
//! of meaningful bits between long zero runs. Each appended value is stored
//! as either a single `0x00` byte ("identical to previous") or a byte-count
//! header followed by the meaningful bytes:
//!
//! ```text
//! nbytes (1..8) | tail (0..63) | nbytes LSB bytes of (xor >> tail), LE
//! ```
//!
//! Values round-trip bit-for-bit, including NaN payloads, infinities and
//! subnormals. The first value is the out-of-band seed.

use crate::codec::buffer::{BitReader, BitWriter};
use crate::error::{Result, StoreError};

/// Encoder state for XOR-compressed values.
#[derive(Debug, Clone, Copy)]
pub struct XorEncoder {
    is_first: bool,
    prev_bits: u64,
}

impl XorEncoder {
    /// Creates an encoder that treats the first appended value as the
    /// out-of-band seed.
    pub fn new() -> Self {
        Self {
            is_first: true,
            prev_bits: 0,
        }
    }

    /// Creates an encoder already primed with `first`, as if it had been
    /// the first appended value.
    pub fn seeded(first: f64) -> Self {
        Self {
            is_first: false,
            prev_bits: first.to_bits(),
        }
    }

    /// Appends a value. Returns [`StoreError::BufferFull`] without mutating
    /// state when fewer than `nbytes + 2` bytes remain.
    pub fn append(&mut self, v: f64, bw: &mut BitWriter<'_>) -> Result<()> {
        let bits = v.to_bits();
        if self.is_first {
            self.is_first = false;
            self.prev_bits = bits;
            return Ok(());
        }

        let xor = self.prev_bits ^ bits;
        if xor == 0 {
            if bw.free_size() < 1 {
                return Err(StoreError::BufferFull);
            }
            bw.write_bits(0, 8)?;
            return Ok(());
        }

        let lead = xor.leading_zeros();
        let tail = xor.trailing_zeros();
        // A u64 has only 8 bytes; the +1 padding byte is dropped when the
        // meaningful run covers the whole word.
        let nbytes = (((64 - lead - tail) / 8 + 1) as usize).min(8);

        if bw.free_size() < nbytes + 2 {
            return Err(StoreError::BufferFull);
        }

        bw.write_bits(nbytes as u64, 8)?;
        bw.write_bits(u64::from(tail), 8)?;
        let shifted = xor >> tail;
        for i in 0..nbytes {
            bw.write_bits((shifted >> (8 * i)) & 0xFF, 8)?;
        }

        self.prev_bits = bits;
        Ok(())
    }
}

impl Default for XorEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder mirroring [`XorEncoder`], primed with the out-of-band seed.
#[derive(Debug, Clone, Copy)]
pub struct XorDecoder {
    prev_bits: u64,
}

impl XorDecoder {
    /// Creates a decoder primed with the seed value.
    pub fn new(first: f64) -> Self {
        Self {
            prev_bits: first.to_bits(),
        }
    }

    /// Decodes the next value.
    pub fn read(&mut self, br: &mut BitReader<'_>) -> Result<f64> {
        let nbytes = br.read_bits(8)? as usize;
        if nbytes == 0 {
            return Ok(f64::from_bits(self.prev_bits));
        }
        if nbytes > 8 {
            return Err(StoreError::CorruptStream(format!(
                "xor byte count {nbytes} out of range"
            )));
        }

        let tail = br.read_bits(8)? as u32;
        if tail > 63 {
            return Err(StoreError::CorruptStream(format!(
                "xor trailing-zero count {tail} out of range"
            )));
        }

        let mut shifted = 0u64;
        for i in 0..nbytes {
            shifted |= br.read_bits(8)? << (8 * i);
        }

        let bits = (shifted << tail) ^ self.prev_bits;
        self.prev_bits = bits;
        Ok(f64::from_bits(bits))
    }
}
