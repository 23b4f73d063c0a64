//! Run-length / variable-length residual coder.
//!
//! The residual sequence is written as repeated groups of
//!
//! ```text
//! [zero run length] [nonzero run length] [zigzag(v) for each nonzero v]
//! ```
//!
//! every integer being a nibble varint (see [`crate::nibble`]). Depth residuals
//! are dominated by zeros (invalid pixels, static background), so long zero
//! runs collapse to a couple of nibbles while the remaining values stay small.

use crate::error::{DepthError, DepthResult};
use crate::nibble::{NibbleReader, NibbleWriter};
use crate::zigzag::ZigZag;

/// Encode `residuals` into a word-aligned nibble stream.
///
/// Run lengths are bounded by `residuals.len()`, which callers keep within
/// [`MAX_PIXELS`](crate::format::MAX_PIXELS).
pub fn encode_residuals(residuals: &[i32]) -> Vec<u8> {
    // Rough guess: one nibble per residual plus run headers.
    let mut writer = NibbleWriter::with_capacity(residuals.len() / 2 + 8);
    let end = residuals.len();
    let mut i = 0;

    while i < end {
        let zeros_start = i;
        while i < end && residuals[i] == 0 {
            i += 1;
        }
        writer.write_varint((i - zeros_start) as u32);

        let nonzero_start = i;
        while i < end && residuals[i] != 0 {
            i += 1;
        }
        writer.write_varint((i - nonzero_start) as u32);

        for &r in &residuals[nonzero_start..i] {
            writer.write_varint(r.zigzag());
        }
    }

    writer.finish()
}

/// Decode exactly `count` residuals from `payload`.
///
/// Fails with `Corrupted` when the stream ends early, when a run would step
/// past `count`, or when whole unread words remain once `count` is reached.
pub fn decode_residuals(payload: &[u8], count: usize) -> DepthResult<Vec<i32>> {
    let mut reader = NibbleReader::new(payload)?;
    let mut residuals = Vec::with_capacity(count);

    while residuals.len() < count {
        let remaining = count - residuals.len();

        let zeros = reader.read_varint()? as usize;
        if zeros > remaining {
            return Err(DepthError::Corrupted);
        }
        residuals.resize(residuals.len() + zeros, 0);

        let nonzeros = reader.read_varint()? as usize;
        if nonzeros > remaining - zeros {
            return Err(DepthError::Corrupted);
        }
        for _ in 0..nonzeros {
            let code = reader.read_varint()?;
            residuals.push(i32::unzigzag(code));
        }
    }

    if reader.remaining_words() != 0 {
        return Err(DepthError::Corrupted);
    }

    Ok(residuals)
}
