//! Key input and live preview, kept behind a capability so the loop runs headless.

use std::time::Duration;

use replay_capture::RawFrame;
use replay_ipc::{ControllerState, KeyCommand};

use crate::error::SurfaceError;

/// What the loop shows after each captured frame.
#[derive(Debug)]
pub struct Preview<'a> {
    /// The frame just captured.
    pub frame: &'a RawFrame,

    pub state: ControllerState,

    /// Frames currently buffered.
    pub buffered: usize,

    /// Ring buffer capacity.
    pub capacity: usize,

    /// Frames appended since capture started.
    pub frames_captured: u64,

    pub target_fps: u32,
}

impl Preview<'_> {
    /// Seconds of footage currently buffered.
    pub fn buffered_seconds(&self) -> f32 {
        self.buffered as f32 / self.target_fps.max(1) as f32
    }
}

/// Front-end the capture loop talks to once per tick.
pub trait ControlSurface {
    /// Wait at most `timeout` for a key command.
    ///
    /// [`SurfaceError::Closed`] ends the loop; other errors are logged and ignored.
    fn poll_command(&mut self, timeout: Duration) -> Result<Option<KeyCommand>, SurfaceError>;

    /// Show the latest frame. Best effort: failures are logged, never fatal.
    fn present(&mut self, preview: &Preview<'_>) -> Result<(), SurfaceError>;
}
