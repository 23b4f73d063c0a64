use thiserror::Error;

/// Failure outcome of [`DepthCodec::compress`] / [`DepthCodec::decompress`].
///
/// Success is `Ok(..)`; these are the only ways a call can fail. None of them
/// are retried internally. After `Corrupted` or `MissingReference` the usual
/// recovery is to ask the sender for a fresh keyframe.
///
/// [`DepthCodec::compress`]: crate::DepthCodec::compress
/// [`DepthCodec::decompress`]: crate::DepthCodec::decompress
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthError {
    /// Zero width or height, frame length not equal to `width * height`,
    /// or a resolution larger than [`MAX_PIXELS`](crate::format::MAX_PIXELS).
    #[error("bad frame dimensions")]
    BadDimensions,

    /// Header tag (or payload stage) does not belong to this codec.
    #[error("buffer is not in this codec's format")]
    WrongFormat,

    /// Truncated or malformed buffer.
    #[error("compressed depth data is corrupted")]
    Corrupted,

    /// Delta frame without a matching reference frame.
    #[error("delta frame requires a reference frame that is not held")]
    MissingReference,
}

pub type DepthResult<T> = std::result::Result<T, DepthError>;
