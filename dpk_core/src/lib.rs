//! Depth-frame codec.
//!
//! Compresses streams of 16-bit depth images into DPK1 frame buffers and back,
//! either exactly ([`LosslessCodec`]) or within a per-depth error bound
//! ([`LossyCodec`]). Frames are quantized, turned into residuals against the
//! previous pixel (keyframes) or the previous frame (delta frames), and packed
//! with a zero-run / zigzag nibble varint code. An optional
//! [`ByteCompressor`] squeezes the result further.

pub mod codec;
pub mod compressor;
pub mod error;
pub mod format;
pub mod nibble;
pub mod predict;
pub mod quantize;
pub mod rvl;
pub mod zigzag;

pub use codec::{DepthCodec, DepthFrame, LosslessCodec, LossyCodec};
pub use compressor::ByteCompressor;
pub use error::{DepthError, DepthResult};
pub use format::{FrameHeader, HEADER_SIZE, MAX_PIXELS};
pub use quantize::{Lossless, Lossy, Quantizer};
