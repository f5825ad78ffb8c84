//! Events sent from the engine to the front-end.

use serde::{Deserialize, Serialize};

use crate::state::{ControllerState, StopReason};
use crate::types::{CaptureStats, SessionSummary};

/// Events that the capture controller emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplayEvent {
    /// Capture loop is up.
    Started(SessionSummary),

    /// Controller state has changed.
    StateChanged {
        previous: ControllerState,
        current: ControllerState,
    },

    /// A clip was requested before the buffer held a full window.
    BufferNotReady {
        /// Frames currently buffered.
        held: usize,

        /// Frames required.
        capacity: usize,

        /// Window length the user asked for.
        seconds_to_keep: u32,
    },

    /// A clip was requested while another save is still writing.
    SaveBusy,

    /// A snapshot was handed to the clip writer.
    SaveStarted {
        /// Number of frames in the snapshot.
        frames: usize,
    },

    /// A clip file was written.
    SaveCompleted {
        /// Path of the written file.
        path: String,

        /// Frames written.
        frames: usize,

        /// Wall time spent writing, in milliseconds.
        elapsed_ms: u64,
    },

    /// A save was aborted.
    SaveFailed {
        /// Error message.
        message: String,
    },

    /// Periodic capture statistics.
    Stats(CaptureStats),

    /// Capture loop has terminated.
    Stopped { reason: StopReason },
}
