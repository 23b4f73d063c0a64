//! Nibble-granular cursors for the variable-length integer code.
//!
//! Every nibble carries 3 payload bits (low) and a continuation flag (0x8).
//! Integers are written least-significant group first. Eight nibbles make a
//! 32-bit word; the first nibble of a word occupies its most significant bits
//! and words are stored little-endian. A partially filled final word is
//! padded with zero nibbles.

use crate::error::{DepthError, DepthResult};

const NIBBLES_PER_WORD: u32 = 8;
const PAYLOAD_BITS: u32 = 3;
const PAYLOAD_MASK: u32 = 0x7;
const CONTINUE: u32 = 0x8;

/// Append-only nibble cursor over an owned byte buffer.
#[derive(Debug, Default)]
pub struct NibbleWriter {
    buf: Vec<u8>,
    word: u32,
    /// Nibbles held in `word` but not yet flushed.
    pending: u32,
}

impl NibbleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    #[inline]
    pub fn write_nibble(&mut self, nibble: u8) {
        self.word = (self.word << 4) | (nibble as u32 & 0xF);
        self.pending += 1;
        if self.pending == NIBBLES_PER_WORD {
            self.buf.extend_from_slice(&self.word.to_le_bytes());
            self.word = 0;
            self.pending = 0;
        }
    }

    /// Write `value` as one or more nibbles. Zero takes exactly one nibble.
    #[inline]
    pub fn write_varint(&mut self, mut value: u32) {
        loop {
            let mut nibble = value & PAYLOAD_MASK;
            value >>= PAYLOAD_BITS;
            if value != 0 {
                nibble |= CONTINUE;
            }
            self.write_nibble(nibble as u8);
            if value == 0 {
                break;
            }
        }
    }

    /// Number of nibbles written so far.
    #[cfg(test)]
    fn nibble_count(&self) -> usize {
        self.buf.len() * 2 + self.pending as usize
    }

    /// Flush the partial word (zero padded) and hand back the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            let word = self.word << (4 * (NIBBLES_PER_WORD - self.pending));
            self.buf.extend_from_slice(&word.to_le_bytes());
        }
        self.buf
    }
}

/// Read cursor mirroring [`NibbleWriter`].
#[derive(Debug)]
pub struct NibbleReader<'a> {
    words: std::slice::ChunksExact<'a, u8>,
    word: u32,
    /// Nibbles of `word` not yet consumed.
    available: u32,
}

impl<'a> NibbleReader<'a> {
    /// Fails with `Corrupted` unless `bytes` is a whole number of words.
    pub fn new(bytes: &'a [u8]) -> DepthResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(DepthError::Corrupted);
        }
        Ok(Self {
            words: bytes.chunks_exact(4),
            word: 0,
            available: 0,
        })
    }

    #[inline]
    pub fn read_nibble(&mut self) -> DepthResult<u8> {
        if self.available == 0 {
            let chunk = self.words.next().ok_or(DepthError::Corrupted)?;
            self.word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            self.available = NIBBLES_PER_WORD;
        }
        let nibble = self.word >> 28;
        self.word <<= 4;
        self.available -= 1;
        Ok(nibble as u8)
    }

    /// Read one integer. Running out of input or a value wider than 32 bits
    /// is `Corrupted`.
    #[inline]
    pub fn read_varint(&mut self) -> DepthResult<u32> {
        let mut value = 0u32;
        let mut shift = 0u32;
        loop {
            let nibble = self.read_nibble()? as u32;
            let payload = nibble & PAYLOAD_MASK;
            let placed = payload << shift;
            if placed >> shift != payload {
                return Err(DepthError::Corrupted);
            }
            value |= placed;
            if nibble & CONTINUE == 0 {
                return Ok(value);
            }
            shift += PAYLOAD_BITS;
            if shift >= u32::BITS {
                return Err(DepthError::Corrupted);
            }
        }
    }

    /// Whole words not yet touched.
    pub fn remaining_words(&self) -> usize {
        self.words.len()
    }
}
