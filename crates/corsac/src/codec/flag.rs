//! Same-or-varint codec for flags and other id-like fields.
//!
//! Flags rarely change between neighbouring records, so each append is a
//! single *same* bit when the value repeats. A changed value is a *differ*
//! bit followed by the value as a base-128 varint (7 value bits per group,
//! continuation in the MSB). The first value is the out-of-band seed.

use crate::codec::buffer::{BitReader, BitWriter};
use crate::error::{Result, StoreError};

/// Longest varint for a u64: ceil(64 / 7) groups.
const MAX_VARINT_GROUPS: usize = 10;

/// Encoder state for same-or-varint fields.
#[derive(Debug, Clone, Copy)]
pub struct FlagEncoder {
    is_first: bool,
    prev: u64,
}

impl FlagEncoder {
    /// Creates an encoder that treats the first appended value as the
    /// out-of-band seed.
    pub fn new() -> Self {
        Self {
            is_first: true,
            prev: 0,
        }
    }

    /// Creates an encoder already primed with `first`, as if it had been
    /// the first appended value.
    pub fn seeded(first: u64) -> Self {
        Self {
            is_first: false,
            prev: first,
        }
    }

    /// Appends a value. Returns [`StoreError::BufferFull`] without mutating
    /// state when the bit-plus-varint cost does not fit.
    pub fn append(&mut self, v: u64, bw: &mut BitWriter<'_>) -> Result<()> {
        if self.is_first {
            self.is_first = false;
            self.prev = v;
            return Ok(());
        }

        if v == self.prev {
            if bw.free_bits() < 1 {
                return Err(StoreError::BufferFull);
            }
            bw.write_bit(true)?;
            return Ok(());
        }

        // Probe the full cost up front so a failed append writes nothing.
        let mut groups = 1;
        let mut probe = v;
        while probe >= 0x80 {
            groups += 1;
            probe >>= 7;
        }
        if bw.free_bits() < 1 + 8 * groups {
            return Err(StoreError::BufferFull);
        }

        bw.write_bit(false)?;
        let mut x = v;
        loop {
            let mut group = x & 0x7F;
            x >>= 7;
            if x != 0 {
                group |= 0x80;
            }
            bw.write_bits(group, 8)?;
            if x == 0 {
                break;
            }
        }

        self.prev = v;
        Ok(())
    }
}

impl Default for FlagEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder mirroring [`FlagEncoder`], primed with the out-of-band seed.
#[derive(Debug, Clone, Copy)]
pub struct FlagDecoder {
    prev: u64,
}

impl FlagDecoder {
    /// Creates a decoder primed with the seed value.
    pub fn new(first: u64) -> Self {
        Self { prev: first }
    }

    /// Decodes the next value.
    pub fn read(&mut self, br: &mut BitReader<'_>) -> Result<u64> {
        if br.read_bit()? {
            return Ok(self.prev);
        }

        let mut result = 0u64;
        for i in 0..MAX_VARINT_GROUPS {
            let group = br.read_bits(8)?;
            result |= (group & 0x7F) << (7 * i);
            if group & 0x80 == 0 {
                self.prev = result;
                return Ok(result);
            }
        }
        Err(StoreError::CorruptStream(
            "varint longer than 10 groups".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(flags: &[u64]) {
        let mut buf = vec![0u8; 11 * flags.len() + 16];
        let mut bw = BitWriter::new(&mut buf);
        let mut enc = FlagEncoder::new();
        for &f in flags {
            enc.append(f, &mut bw).unwrap();
        }

        let mut br = BitReader::new(&buf);
        let mut dec = FlagDecoder::new(flags[0]);
        for &expected in &flags[1..] {
            assert_eq!(dec.read(&mut br).unwrap(), expected);
        }
    }

    #[test]
    fn test_repeated_flags_cost_one_bit_each() {
        let flags = [5u64; 9];
        let mut buf = vec![0u8; 16];
        let cap_bits = buf.len() * 8;
        let mut bw = BitWriter::new(&mut buf);
        let mut enc = FlagEncoder::new();
        for &f in &flags {
            enc.append(f, &mut bw).unwrap();
        }
        assert_eq!(cap_bits - bw.position(), 8);
        roundtrip(&flags);
    }

    #[test]
    fn test_changing_flags() {
        roundtrip(&[0, 1, 1, 127, 128, 128, 0, 16_384, u64::MAX]);
    }

    #[test]
    fn test_zero_after_nonzero() {
        roundtrip(&[7, 0, 0, 7]);
    }

    #[test]
    fn test_full_buffer_keeps_state() {
        let mut buf = [0u8; 1];
        let mut bw = BitWriter::new(&mut buf);
        let mut enc = FlagEncoder::new();
        enc.append(1, &mut bw).unwrap(); // seed
        // Differ bit + one varint group needs 9 bits; only 8 remain.
        assert!(matches!(
            enc.append(2, &mut bw),
            Err(StoreError::BufferFull)
        ));
        // Same-value bit still fits, and prev was not clobbered by the
        // failed append.
        enc.append(1, &mut bw).unwrap();

        let mut br = BitReader::new(&buf);
        let mut dec = FlagDecoder::new(1);
        assert_eq!(dec.read(&mut br).unwrap(), 1);
    }

    #[test]
    fn test_runaway_continuation_is_corrupt() {
        // Differ bit followed by eleven continuation groups.
        let mut buf = vec![0u8; 16];
        let mut bw = BitWriter::new(&mut buf);
        bw.write_bit(false).unwrap();
        for _ in 0..11 {
            bw.write_bits(0xFF, 8).unwrap();
        }

        let mut br = BitReader::new(&buf);
        let mut dec = FlagDecoder::new(0);
        assert!(matches!(
            dec.read(&mut br),
            Err(StoreError::CorruptStream(_))
        ));
    }
}
