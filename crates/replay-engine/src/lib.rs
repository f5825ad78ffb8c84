//! Core capture engine for the replay recorder.
//!
//! A [`CaptureController`] grabs frames from a [`replay_capture::FrameSource`],
//! keeps the last `seconds_to_keep * fps` of them JPEG-compressed in a
//! [`RingBuffer`], and writes a snapshot to disk through a [`ClipWriter`]
//! whenever the clip key is pressed.

mod clip_writer;
mod controller;
mod error;
mod metrics;
mod pacer;
mod ring_buffer;
mod save_worker;
mod session;
mod surface;

#[cfg(test)]
mod testing;

pub use clip_writer::{ClipWriter, SavedClip, CLIP_FILE_PREFIX, CLIP_TIMESTAMP_FORMAT};
pub use controller::{CaptureController, STATS_INTERVAL};
pub use error::{SaveRequestError, SessionError, SurfaceError, WriteError};
pub use metrics::CaptureMetrics;
pub use pacer::{sleep_budget, Pacer, TickTiming};
pub use ring_buffer::{RingBuffer, Snapshot};
pub use save_worker::{SaveJob, SaveReport, SaveWorker};
pub use session::{CaptureSession, DEFAULT_PATTERN_RESOLUTION};
pub use surface::{ControlSurface, Preview};
