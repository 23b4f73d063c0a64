/// Second-stage general-purpose byte compressor.
///
/// The depth codec treats implementations as an opaque byte transform layered
/// over the nibble-VLE stream. Each implementation:
/// - Is identified by a stable nonzero `id()` recorded in the frame header
///   (`STAGE_STORED = 0` is reserved for "no second stage").
/// - Must be deterministic on decode: `decompress(compress(x), x.len()) == x`.
/// - Carries no state between calls, so one instance may serve any number of
///   frames and streams.
pub trait ByteCompressor: Send + Sync {
    /// Stable stage ID stored in the frame header.
    fn id(&self) -> u8;

    /// Human-readable compressor name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress one frame's VLE payload.
    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Invert [`compress`](Self::compress). `raw_len` is the exact length of
    /// the original payload, as recorded in the frame header.
    fn decompress(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>>;
}
