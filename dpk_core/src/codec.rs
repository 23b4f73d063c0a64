use std::borrow::Cow;

use xxhash_rust::xxh3::xxh3_64;

use crate::compressor::ByteCompressor;
use crate::error::{DepthError, DepthResult};
use crate::format::{self, FrameHeader, HEADER_SIZE, STAGE_STORED};
use crate::predict::{Prediction, Predictor};
use crate::quantize::{Lossless, Lossy, Quantizer};
use crate::rvl;

/// A decoded depth frame: `width * height` samples in row-major order,
/// 0 meaning "no depth".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub depth: Vec<u16>,
}

/// Stateful depth-frame compressor / decompressor for one stream.
///
/// # Pipeline
/// ```text
/// compress:   depth → quantize → predict → nibble-VLE → [second stage] → header + payload
/// decompress: header + payload → [second stage]⁻¹ → nibble-VLE⁻¹ → predict⁻¹ → dequantize
/// ```
///
/// # Reference frame
/// Delta frames are predicted from the last frame this instance successfully
/// compressed or decompressed. Only a fully successful call replaces it; any
/// error leaves the instance exactly as it was, so the caller can recover by
/// moving on to a keyframe. Use one instance per stream and one stream per
/// instance: an encoder and the matching decoder each keep their own copy.
pub struct DepthCodec<Q: Quantizer> {
    quantizer: Q,
    predictor: Predictor,
    compressor: Option<Box<dyn ByteCompressor>>,
}

/// Exact depth codec.
pub type LosslessCodec = DepthCodec<Lossless>;

/// Bounded-error depth codec.
pub type LossyCodec = DepthCodec<Lossy>;

impl LosslessCodec {
    pub fn lossless() -> Self {
        Self::new(Lossless)
    }
}

impl LossyCodec {
    pub fn lossy() -> Self {
        Self::new(Lossy)
    }
}

impl<Q: Quantizer> DepthCodec<Q> {
    /// Codec without a second stage: payloads are always the raw VLE stream.
    pub fn new(quantizer: Q) -> Self {
        Self {
            quantizer,
            predictor: Predictor::new(),
            compressor: None,
        }
    }

    /// Codec that tries `compressor` on every payload and keeps its output
    /// when strictly smaller.
    ///
    /// A decoder only needs the compressor if the encoder had one; a
    /// decoder without it rejects compressed payloads with `WrongFormat`.
    pub fn with_compressor(quantizer: Q, compressor: Box<dyn ByteCompressor>) -> Self {
        Self {
            quantizer,
            predictor: Predictor::new(),
            compressor: Some(compressor),
        }
    }

    pub fn quantizer(&self) -> &Q {
        &self.quantizer
    }

    pub fn compressor(&self) -> Option<&dyn ByteCompressor> {
        self.compressor.as_deref()
    }

    /// Replace the second stage. The reference frame is kept, so a decoder can
    /// pick up the compressor named by a frame header mid-stream.
    pub fn set_compressor(&mut self, compressor: Option<Box<dyn ByteCompressor>>) {
        self.compressor = compressor;
    }

    /// Whether a delta frame at the reference's resolution can be processed.
    pub fn has_reference(&self) -> bool {
        self.predictor.reference().is_some()
    }

    /// Forget the reference frame; the next frame must be a keyframe.
    pub fn reset(&mut self) {
        self.predictor.reset();
    }

    /// Compress one frame.
    ///
    /// `keyframe == false` predicts from the reference and fails with
    /// `MissingReference` when none is held at this resolution.
    pub fn compress(
        &mut self,
        width: u32,
        height: u32,
        depth: &[u16],
        keyframe: bool,
    ) -> DepthResult<Vec<u8>> {
        let pixels = format::pixel_count(width, height)?;
        if depth.len() != pixels {
            return Err(DepthError::BadDimensions);
        }

        let frame_number = self
            .predictor
            .reference()
            .map_or(0, |r| r.frame_number.wrapping_add(1));

        let prediction = if keyframe {
            self.predictor.begin_keyframe()
        } else {
            self.predictor.begin_delta_frame(width, height)?
        };

        let quantized: Vec<i32> = depth.iter().map(|&d| self.quantizer.quantize(d)).collect();
        let residuals = prediction.encode(&quantized);
        let vle = rvl::encode_residuals(&residuals);
        // Both lengths stay far below 4 GiB because `pixels <= MAX_PIXELS`.
        let raw_len = u32::try_from(vle.len()).map_err(|_| DepthError::Corrupted)?;

        let (stage, payload) = self.pack(vle);
        let payload_len = u32::try_from(payload.len()).map_err(|_| DepthError::Corrupted)?;

        let header = FrameHeader {
            tag: self.quantizer.tag(),
            keyframe,
            stage,
            frame_number,
            width,
            height,
            raw_len,
            payload_len,
            checksum: xxh3_64(&payload),
        };

        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&payload);

        log::debug!(
            "compressed {} {}x{} {} #{}: {} -> {} bytes ({})",
            self.quantizer.name(),
            width,
            height,
            if keyframe { "keyframe" } else { "delta" },
            frame_number,
            pixels * 2,
            out.len(),
            format::stage_name(stage),
        );

        self.predictor.commit(width, height, frame_number, quantized);
        Ok(out)
    }

    /// Decompress one frame produced by a codec of the same tier.
    pub fn decompress(&mut self, buf: &[u8]) -> DepthResult<DepthFrame> {
        if buf.len() < HEADER_SIZE {
            return Err(DepthError::Corrupted);
        }
        if buf[0] != self.quantizer.tag() {
            return Err(DepthError::WrongFormat);
        }
        let header = FrameHeader::peek(buf)?;
        let pixels = header.pixel_count()?;

        let payload = &buf[HEADER_SIZE..];
        if payload.len() != header.payload_len as usize {
            return Err(DepthError::Corrupted);
        }
        if xxh3_64(payload) != header.checksum {
            return Err(DepthError::Corrupted);
        }

        let prediction = if header.keyframe {
            self.predictor.begin_keyframe()
        } else {
            self.begin_delta_decode(&header)?
        };

        let vle = self.unpack(&header, payload, pixels)?;
        let residuals = rvl::decode_residuals(&vle, pixels)?;
        let quantized = prediction.decode(&residuals);
        let max_step = self.quantizer.max_step();
        if quantized.iter().any(|&q| !(0..=max_step).contains(&q)) {
            return Err(DepthError::Corrupted);
        }
        let depth: Vec<u16> = quantized
            .iter()
            .map(|&q| self.quantizer.dequantize(q))
            .collect();

        log::debug!(
            "decompressed {} {}x{} {} #{} from {} bytes ({})",
            self.quantizer.name(),
            header.width,
            header.height,
            if header.keyframe { "keyframe" } else { "delta" },
            header.frame_number,
            buf.len(),
            format::stage_name(header.stage),
        );

        self.predictor
            .commit(header.width, header.height, header.frame_number, quantized);
        Ok(DepthFrame {
            width: header.width,
            height: header.height,
            depth,
        })
    }

    /// Delta frames must follow the reference directly; a gap in frame
    /// numbers means the reference is stale.
    fn begin_delta_decode(&self, header: &FrameHeader) -> DepthResult<Prediction<'_>> {
        let prediction = self.predictor.begin_delta_frame(header.width, header.height)?;
        let expected = self
            .predictor
            .reference()
            .map(|r| r.frame_number.wrapping_add(1));
        if expected != Some(header.frame_number) {
            return Err(DepthError::MissingReference);
        }
        Ok(prediction)
    }

    /// Run the second stage, falling back to the VLE stream unless it shrinks.
    fn pack(&self, vle: Vec<u8>) -> (u8, Vec<u8>) {
        let Some(compressor) = &self.compressor else {
            return (STAGE_STORED, vle);
        };
        match compressor.compress(&vle) {
            Ok(packed) if packed.len() < vle.len() => (compressor.id(), packed),
            Ok(_) => (STAGE_STORED, vle),
            Err(e) => {
                log::warn!("{} stage failed, storing VLE payload: {}", compressor.name(), e);
                (STAGE_STORED, vle)
            }
        }
    }

    /// Undo the second stage recorded in `header`.
    fn unpack<'a>(
        &self,
        header: &FrameHeader,
        payload: &'a [u8],
        pixels: usize,
    ) -> DepthResult<Cow<'a, [u8]>> {
        let raw_len = header.raw_len as usize;
        if raw_len > max_vle_len(pixels) {
            return Err(DepthError::Corrupted);
        }

        if header.stage == STAGE_STORED {
            if raw_len != payload.len() {
                return Err(DepthError::Corrupted);
            }
            return Ok(Cow::Borrowed(payload));
        }

        let compressor = self
            .compressor
            .as_deref()
            .filter(|c| c.id() == header.stage)
            .ok_or(DepthError::WrongFormat)?;

        let vle = compressor.decompress(payload, raw_len).map_err(|e| {
            log::debug!("{} stage rejected payload: {}", compressor.name(), e);
            DepthError::Corrupted
        })?;
        if vle.len() != raw_len {
            return Err(DepthError::Corrupted);
        }
        Ok(Cow::Owned(vle))
    }
}

/// Upper bound on the VLE stream length for `pixels` residuals. The densest
/// case, alternating single zero and single nonzero pixels with 17-bit
/// residuals, costs eight nibbles per two pixels.
fn max_vle_len(pixels: usize) -> usize {
    pixels * 4 + 64
}
