//! Residual prediction over quantized frames.
//!
//! Keyframes predict each sample from the previous one in scan order (an
//! implicit 0 before the first pixel). Delta frames predict each sample from
//! the same position in the held reference frame.

use crate::error::{DepthError, DepthResult};

/// Last successfully encoded or decoded quantized frame.
#[derive(Debug, Clone)]
pub struct Reference {
    pub width: u32,
    pub height: u32,
    pub frame_number: u16,
    pub samples: Vec<i32>,
}

/// Owner of the reference frame for one stream.
#[derive(Debug, Default)]
pub struct Predictor {
    reference: Option<Reference>,
}

impl Predictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    /// Spatial prediction. The held reference stays in place until
    /// [`commit`](Self::commit), so a keyframe that fails half way leaves
    /// the stream untouched.
    pub fn begin_keyframe(&self) -> Prediction<'_> {
        Prediction::Spatial
    }

    /// Temporal prediction against the held reference, which must have the
    /// given resolution.
    pub fn begin_delta_frame(&self, width: u32, height: u32) -> DepthResult<Prediction<'_>> {
        match &self.reference {
            Some(r) if r.width == width && r.height == height => {
                Ok(Prediction::Temporal(&r.samples))
            }
            _ => Err(DepthError::MissingReference),
        }
    }

    /// Install `samples` as the new reference.
    pub fn commit(&mut self, width: u32, height: u32, frame_number: u16, samples: Vec<i32>) {
        self.reference = Some(Reference {
            width,
            height,
            frame_number,
            samples,
        });
    }

    pub fn reset(&mut self) {
        if self.reference.take().is_some() {
            log::debug!("reference frame dropped");
        }
    }
}

/// Predictor choice for a single frame.
#[derive(Debug, Clone, Copy)]
pub enum Prediction<'a> {
    Spatial,
    Temporal(&'a [i32]),
}

impl Prediction<'_> {
    /// Residuals `quantized[i] - predicted[i]`.
    ///
    /// For `Temporal`, `quantized` must have the reference's length.
    pub fn encode(&self, quantized: &[i32]) -> Vec<i32> {
        match *self {
            Prediction::Spatial => {
                let mut prev = 0i32;
                quantized
                    .iter()
                    .map(|&q| {
                        let r = q.wrapping_sub(prev);
                        prev = q;
                        r
                    })
                    .collect()
            }
            Prediction::Temporal(reference) => quantized
                .iter()
                .zip(reference)
                .map(|(&q, &p)| q.wrapping_sub(p))
                .collect(),
        }
    }

    /// Inverse of [`encode`](Self::encode), applied in the same scan order.
    pub fn decode(&self, residuals: &[i32]) -> Vec<i32> {
        match *self {
            Prediction::Spatial => {
                let mut prev = 0i32;
                residuals
                    .iter()
                    .map(|&r| {
                        prev = prev.wrapping_add(r);
                        prev
                    })
                    .collect()
            }
            Prediction::Temporal(reference) => residuals
                .iter()
                .zip(reference)
                .map(|(&r, &p)| p.wrapping_add(r))
                .collect(),
        }
    }
}
