use crate::error::{DepthError, DepthResult};

/// Fixed size of the DPK1 frame header in bytes.
///   tag:u8 + keyframe:u8 + stage:u8 + reserved:u8 + frame_number:u16
///   + reserved:u16 + width:u32 + height:u32 + raw_len:u32 + payload_len:u32
///   + checksum:u64
///   = 1 + 1 + 1 + 1 + 2 + 2 + 4 + 4 + 4 + 4 + 8 = 32
pub const HEADER_SIZE: usize = 32;

/// Largest `width * height` accepted on either side of the codec.
pub const MAX_PIXELS: u64 = 1 << 26;

// ── Format tags ────────────────────────────────────────────────────────────
// High nibble: tier. Low nibble: format version.

pub const FORMAT_VERSION: u8 = 1;
pub const TAG_LOSSLESS: u8 = 0xD0 | FORMAT_VERSION;
pub const TAG_LOSSY: u8 = 0xE0 | FORMAT_VERSION;

// ── Payload stages ─────────────────────────────────────────────────────────

/// Payload is the nibble-VLE stream itself.
pub const STAGE_STORED: u8 = 0;
pub const STAGE_ZSTD: u8 = 1;
pub const STAGE_LZ4: u8 = 2;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 32-byte DPK1 frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    pub keyframe: bool,
    /// Which second stage produced the payload (`STAGE_*`).
    pub stage: u8,
    pub frame_number: u16,
    pub width: u32,
    pub height: u32,
    /// Length of the nibble-VLE stream before the second stage.
    pub raw_len: u32,
    /// Length of the payload that follows the header.
    pub payload_len: u32,
    /// xxh3-64 of the payload bytes.
    pub checksum: u64,
}

impl FrameHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.tag;
        buf[1] = self.keyframe as u8;
        buf[2] = self.stage;
        // buf[3] reserved
        buf[4..6].copy_from_slice(&self.frame_number.to_le_bytes());
        // buf[6..8] reserved
        buf[8..12].copy_from_slice(&self.width.to_le_bytes());
        buf[12..16].copy_from_slice(&self.height.to_le_bytes());
        buf[16..20].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[20..24].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse the header at the front of `buf` without validating the tag or
    /// the payload. Only the structure of the header itself is checked.
    pub fn peek(buf: &[u8]) -> DepthResult<Self> {
        let head: &[u8; HEADER_SIZE] = buf
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or(DepthError::Corrupted)?;

        let keyframe = match head[1] {
            0 => false,
            1 => true,
            _ => return Err(DepthError::Corrupted),
        };

        Ok(Self {
            tag: head[0],
            keyframe,
            stage: head[2],
            frame_number: u16::from_le_bytes([head[4], head[5]]),
            width: read_u32(head, 8),
            height: read_u32(head, 12),
            raw_len: read_u32(head, 16),
            payload_len: read_u32(head, 20),
            checksum: u64::from_le_bytes([
                head[24], head[25], head[26], head[27], head[28], head[29], head[30], head[31],
            ]),
        })
    }

    /// Pixel count, or `BadDimensions` when zero or above [`MAX_PIXELS`].
    pub fn pixel_count(&self) -> DepthResult<usize> {
        pixel_count(self.width, self.height)
    }
}

#[inline]
fn read_u32(head: &[u8; HEADER_SIZE], at: usize) -> u32 {
    u32::from_le_bytes([head[at], head[at + 1], head[at + 2], head[at + 3]])
}

/// Validated `width * height`.
pub fn pixel_count(width: u32, height: u32) -> DepthResult<usize> {
    let n = width as u64 * height as u64;
    if n == 0 || n > MAX_PIXELS {
        return Err(DepthError::BadDimensions);
    }
    Ok(n as usize)
}

/// True when `buf` starts with a DPK1 frame header of either tier.
pub fn is_depth_frame(buf: &[u8]) -> bool {
    buf.len() >= HEADER_SIZE && matches!(buf[0], TAG_LOSSLESS | TAG_LOSSY)
}

/// True when `buf` is a DPK1 keyframe, decodable without a reference.
pub fn is_keyframe(buf: &[u8]) -> bool {
    is_depth_frame(buf) && buf[1] == 1
}

/// Tier name for a format tag.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        TAG_LOSSLESS => "lossless",
        TAG_LOSSY => "lossy",
        _ => "unknown",
    }
}

/// Stage name for a payload stage id.
pub fn stage_name(stage: u8) -> &'static str {
    match stage {
        STAGE_STORED => "stored",
        STAGE_ZSTD => "zstd",
        STAGE_LZ4 => "lz4",
        _ => "unknown",
    }
}
