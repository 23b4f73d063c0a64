use dpk_core::compressor::ByteCompressor;
use dpk_core::format::STAGE_ZSTD;

/// Zstandard second stage.
///
/// The nibble stream still carries byte-level redundancy (repeated residual
/// patterns along rows, padded words), which zstd picks up cheaply. Level 1 is
/// the default because a 30 FPS stream leaves only a few milliseconds per frame.
///
/// Best for: bandwidth-constrained links where a little extra CPU is fine.
pub struct ZstdCompressor {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 1 }
    }
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl ByteCompressor for ZstdCompressor {
    fn id(&self) -> u8 {
        STAGE_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let compressed = zstd::bulk::compress(raw, self.level)?;
        Ok(compressed)
    }

    fn decompress(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        // The header gives the exact original size, so decode into a buffer
        // of that capacity; zstd errors out if the frame would exceed it.
        let raw = zstd::bulk::decompress(compressed, raw_len)?;
        Ok(raw)
    }
}
