//! Error types for the capture module.

use replay_ipc::{Region, Resolution};
use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Screen capture backend error.
    #[error("Capture backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<xcap::XCapError>,
    },

    /// No displays available.
    #[error("No monitors found")]
    NoMonitors,

    /// Requested monitor does not exist.
    #[error("Capture source not found: {0}")]
    SourceNotFound(String),

    /// Region does not fit on the selected monitor.
    #[error("Region {region:?} does not fit within a {bounds} monitor")]
    RegionOutOfBounds { region: Region, bounds: Resolution },

    /// The backend returned a frame of the wrong size.
    #[error("Frame size mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: Resolution,
        actual: Resolution,
    },

    /// Source has been closed.
    #[error("Capture source closed")]
    Closed,
}

impl From<xcap::XCapError> for CaptureError {
    fn from(err: xcap::XCapError) -> Self {
        Self::Backend {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
