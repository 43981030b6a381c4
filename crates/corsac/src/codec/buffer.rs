//! Back-to-front bit buffer over a fixed byte region.
//!
//! The chunk payload is written from the end of the region toward its
//! beginning. The cursor is a single bit position counting down from
//! `len * 8` to 0; bit position `p` maps to byte `p / 8`, bit `p % 8`
//! (LSB = 0). Fields are written most-significant-bit first at descending
//! positions, so a byte-aligned 8-bit write stores the value as a plain
//! byte and multi-byte fields land low-byte-at-lower-address.
//!
//! The buffer never owns the underlying bytes: [`BitWriter`] borrows them
//! mutably from the chunk (or a test harness), [`BitReader`] borrows them
//! shared. A reader opened over the region starts where the first write
//! started and moves the same direction, so it replays fields in the exact
//! order they were written.

use crate::error::{Result, StoreError};

/// Write side of the bit buffer.
///
/// Every write is bounds-checked; running out of space yields
/// [`StoreError::BufferFull`] and leaves the buffer untouched.
#[derive(Debug)]
pub struct BitWriter<'a> {
    bytes: &'a mut [u8],
    pos: usize,
}

impl<'a> BitWriter<'a> {
    /// Opens a writer over an empty region. Writing starts at the end.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        let pos = bytes.len() * 8;
        Self { bytes, pos }
    }

    /// Reopens a writer at a previously saved cursor, resuming an open
    /// chunk whose buffer was persisted mid-write.
    pub fn resume(bytes: &'a mut [u8], pos: usize) -> Result<Self> {
        if pos > bytes.len() * 8 {
            return Err(StoreError::CorruptStream(format!(
                "write cursor {} past buffer of {} bits",
                pos,
                bytes.len() * 8
            )));
        }
        Ok(Self { bytes, pos })
    }

    /// Number of whole bytes still free before the front of the region.
    pub fn free_size(&self) -> usize {
        self.pos / 8
    }

    /// Number of bits still free.
    pub fn free_bits(&self) -> usize {
        self.pos
    }

    /// True when not a single bit remains.
    pub fn is_full(&self) -> bool {
        self.pos == 0
    }

    /// Current bit cursor. Persisted by the chunk as its write offset and
    /// usable as a checkpoint for [`BitWriter::rewind`].
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Restores the cursor to an earlier checkpoint, discarding everything
    /// written since. Stale bits below the restored cursor are harmless:
    /// the next write overwrites them bit by bit.
    pub fn rewind(&mut self, checkpoint: usize) {
        debug_assert!(checkpoint >= self.pos && checkpoint <= self.bytes.len() * 8);
        self.pos = checkpoint;
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(u64::from(bit), 1)
    }

    /// Writes the `n` low bits of `v`, most significant first.
    pub fn write_bits(&mut self, v: u64, n: u32) -> Result<()> {
        debug_assert!(n <= 64);
        if self.pos < n as usize {
            return Err(StoreError::BufferFull);
        }
        for k in (0..n).rev() {
            self.pos -= 1;
            let byte = self.pos / 8;
            let mask = 1u8 << (self.pos % 8);
            if (v >> k) & 1 == 1 {
                self.bytes[byte] |= mask;
            } else {
                self.bytes[byte] &= !mask;
            }
        }
        Ok(())
    }
}

/// Read side of the bit buffer.
///
/// Always starts at the write end of the region and consumes fields in the
/// order they were written. Underflow means the stream claims more fields
/// than were stored, which is corruption.
#[derive(Debug)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Opens a reader over a written region.
    pub fn new(bytes: &'a [u8]) -> Self {
        let pos = bytes.len() * 8;
        Self { bytes, pos }
    }

    /// Current bit cursor (bits not yet consumed).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `n` bits written most-significant first.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        debug_assert!(n <= 64);
        if self.pos < n as usize {
            return Err(StoreError::CorruptStream(
                "stream ended mid-field".to_string(),
            ));
        }
        let mut v = 0u64;
        for _ in 0..n {
            self.pos -= 1;
            let bit = (self.bytes[self.pos / 8] >> (self.pos % 8)) & 1;
            v = (v << 1) | u64::from(bit);
        }
        Ok(v)
    }
}
