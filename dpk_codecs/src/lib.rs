mod lz4_stage;
mod zstd_stage;

pub use lz4_stage::Lz4Compressor;
pub use zstd_stage::ZstdCompressor;

use dpk_core::format::{STAGE_LZ4, STAGE_STORED, STAGE_ZSTD};
use dpk_core::ByteCompressor;

/// Resolve a second stage from the `stage` byte of a frame header.
///
/// `STAGE_STORED` resolves to `None`: such payloads need no second stage.
pub fn compressor_by_id(id: u8) -> anyhow::Result<Option<Box<dyn ByteCompressor>>> {
    match id {
        STAGE_STORED => Ok(None),
        STAGE_ZSTD => Ok(Some(Box::new(ZstdCompressor::default()))),
        STAGE_LZ4 => Ok(Some(Box::new(Lz4Compressor))),
        _ => anyhow::bail!("unknown payload stage {}; supported: 0 (stored), 1 (zstd), 2 (lz4)", id),
    }
}

/// Resolve a second stage by CLI name. `zstd_level` only applies to zstd.
pub fn compressor_by_name(name: &str, zstd_level: i32) -> anyhow::Result<Option<Box<dyn ByteCompressor>>> {
    match name {
        "none" | "stored" => Ok(None),
        "zstd" | "z" => Ok(Some(Box::new(ZstdCompressor::new(zstd_level)))),
        "lz4" | "l" => Ok(Some(Box::new(Lz4Compressor))),
        other => anyhow::bail!("unknown compressor '{}'. Valid options: none, zstd, lz4", other),
    }
}
