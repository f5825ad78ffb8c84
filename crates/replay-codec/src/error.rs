//! Error types for the codec module.

use replay_ipc::Resolution;
use thiserror::Error;

/// Errors from compressing or decompressing a single frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Compression failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Payload is not a valid encoded frame.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Decoded frame has a different size than recorded.
    #[error("Decoded frame is {actual}, expected {expected}")]
    DimensionMismatch {
        expected: Resolution,
        actual: Resolution,
    },
}

/// Errors from writing a video container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// I/O failure on the output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame does not match the stream resolution.
    #[error("Frame rejected: stream is {expected}, frame is {actual}")]
    FrameRejected {
        expected: Resolution,
        actual: Resolution,
    },

    /// Frame data is malformed.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Recompressing a frame for the container failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Output would exceed the format's size limit.
    #[error("Container size limit exceeded")]
    TooLarge,
}
