//! Fixed-region screen capture for the replay recorder.
//!
//! A [`FrameSource`] hands out one raw RGB frame per call, always sized to
//! the region chosen when the source was opened.

mod error;
mod frame;
mod monitor;
mod pattern;
mod screen;

pub use error::CaptureError;
pub use frame::{CaptureTimestamp, RawFrame};
pub use monitor::{enumerate_monitors, MonitorInfo};
pub use pattern::TestPatternSource;
pub use screen::ScreenSource;

use replay_ipc::{Region, Resolution};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Trait for frame sources.
pub trait FrameSource {
    /// Grab one frame of the configured region.
    ///
    /// The returned frame always matches [`FrameSource::region`] in size;
    /// anything else is reported as [`CaptureError::DimensionMismatch`].
    fn grab(&mut self) -> CaptureResult<RawFrame>;

    /// The capture rectangle fixed at open time.
    fn region(&self) -> Region;

    /// Size of every frame this source produces.
    fn resolution(&self) -> Resolution {
        self.region().resolution()
    }

    /// Display name for logs and the startup summary.
    fn name(&self) -> String;

    /// Release capture resources. Further grabs fail with [`CaptureError::Closed`].
    fn close(&mut self) -> CaptureResult<()> {
        Ok(())
    }
}
