//! Depth quantization curves.
//!
//! A [`Quantizer`] maps raw 16-bit depth to an integer step index and back.
//! Implementations are pure: every encoder and decoder of a given tier must
//! agree on them bit-for-bit, and 0 ("no depth") always maps to 0.

use crate::format::{TAG_LOSSLESS, TAG_LOSSY};

/// Quantization strategy selected when a [`DepthCodec`](crate::DepthCodec)
/// is constructed.
pub trait Quantizer {
    /// Wire format tag written into (and required from) every frame header.
    fn tag(&self) -> u8;

    /// Human-readable tier name.
    fn name(&self) -> &'static str;

    fn quantize(&self, raw: u16) -> i32;

    /// Largest step `quantize` can produce. Valid steps are `0..=max_step()`.
    fn max_step(&self) -> i32;

    /// Representative raw depth for `step`. Total over all of `i32`.
    fn dequantize(&self, step: i32) -> u16;
}

/// Exact tier: the step index is the raw depth itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Lossless;

impl Quantizer for Lossless {
    fn tag(&self) -> u8 {
        TAG_LOSSLESS
    }

    fn name(&self) -> &'static str {
        "lossless"
    }

    #[inline]
    fn quantize(&self, raw: u16) -> i32 {
        raw as i32
    }

    fn max_step(&self) -> i32 {
        u16::MAX as i32
    }

    #[inline]
    fn dequantize(&self, step: i32) -> u16 {
        step.clamp(0, u16::MAX as i32) as u16
    }
}

/// One piece of the lossy curve: raw depths from `raw_start` up to the next
/// segment's start share steps of width `1 << shift`.
#[derive(Debug, Clone, Copy)]
struct Segment {
    raw_start: u32,
    step_start: i32,
    shift: u32,
}

const fn segment(raw_start: u32, step_start: i32, shift: u32) -> Segment {
    Segment {
        raw_start,
        step_start,
        shift,
    }
}

// Step width doubles with every octave of depth past 1024.
static LOSSY_CURVE: [Segment; 7] = [
    segment(0, 0, 0),
    segment(1024, 1024, 1),
    segment(2048, 1536, 2),
    segment(4096, 2048, 3),
    segment(8192, 2560, 4),
    segment(16384, 3072, 5),
    segment(32768, 3584, 6),
];

/// One past the largest step index the lossy curve produces.
pub const LOSSY_STEP_COUNT: i32 = 4096;

/// Bounded-error tier: piecewise-linear curve, exact below 1024, then
/// power-of-two step widths up to 64 at the far end of the range.
///
/// `dequantize` returns the middle of the step, so a round trip is off by at
/// most half of [`Lossy::step_width`] at that depth.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Lossy;

impl Lossy {
    /// Width of the quantization step containing `raw`.
    pub fn step_width(raw: u16) -> u16 {
        1 << Self::segment_for_raw(raw as u32).shift
    }

    fn segment_for_raw(raw: u32) -> Segment {
        *LOSSY_CURVE
            .iter()
            .rev()
            .find(|s| raw >= s.raw_start)
            .unwrap_or(&LOSSY_CURVE[0])
    }

    fn segment_for_step(step: i32) -> Segment {
        *LOSSY_CURVE
            .iter()
            .rev()
            .find(|s| step >= s.step_start)
            .unwrap_or(&LOSSY_CURVE[0])
    }
}

impl Quantizer for Lossy {
    fn tag(&self) -> u8 {
        TAG_LOSSY
    }

    fn name(&self) -> &'static str {
        "lossy"
    }

    #[inline]
    fn quantize(&self, raw: u16) -> i32 {
        let raw = raw as u32;
        let s = Self::segment_for_raw(raw);
        s.step_start + ((raw - s.raw_start) >> s.shift) as i32
    }

    fn max_step(&self) -> i32 {
        LOSSY_STEP_COUNT - 1
    }

    #[inline]
    fn dequantize(&self, step: i32) -> u16 {
        if step <= 0 {
            return 0;
        }
        let step = step.min(LOSSY_STEP_COUNT - 1);
        let s = Self::segment_for_step(step);
        let offset = ((step - s.step_start) as u32) << s.shift;
        let raw = s.raw_start + offset + ((1u32 << s.shift) >> 1);
        raw.min(u16::MAX as u32) as u16
    }
}
