//! Error types for the engine.

use std::path::PathBuf;

use replay_capture::CaptureError;
use replay_codec::{CodecError, ContainerError};
use replay_ipc::ConfigError;
use thiserror::Error;

/// A save was aborted. The live buffer and capture loop are unaffected.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The snapshot held no frames.
    #[error("Nothing to save: snapshot is empty")]
    EmptySnapshot,

    /// The output could not be created.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    /// A buffered frame could not be decompressed.
    #[error("Failed to decode frame {index} of {total}: {source}")]
    Decode {
        index: usize,
        total: usize,
        #[source]
        source: CodecError,
    },

    /// The container rejected a frame.
    #[error("Container rejected frame {index} of {total}: {source}")]
    Rejected {
        index: usize,
        total: usize,
        #[source]
        source: ContainerError,
    },

    /// Trailer or close failed.
    #[error("Failed to finalize {path}: {source}")]
    Finish {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    /// The save worker is gone.
    #[error("Save worker unavailable")]
    WorkerGone,
}

/// A clip request that was not accepted. Neither is a failure of the loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SaveRequestError {
    /// The buffer does not hold a full window yet.
    #[error("Buffer not full yet: {held}/{capacity} frames")]
    BufferNotReady { held: usize, capacity: usize },

    /// Another save is still writing.
    #[error("A clip is already being saved")]
    Busy,
}

/// Errors opening a capture session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture init failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Output directory {path} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the control surface (keys and preview).
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Control surface I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No more input will arrive.
    #[error("Control surface closed")]
    Closed,
}
