//! Capture controller state machine types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The current state of the capture controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Capturing into the ring buffer.
    #[default]
    Capturing,

    /// Capturing while a snapshot is being written to disk.
    Saving,

    /// Loop terminated. Terminal state.
    Stopped,
}

impl ControllerState {
    /// Returns true if the controller is capturing with no save in flight.
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    /// Returns true if a save is in flight.
    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving)
    }

    /// Returns true once the loop has terminated.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capturing => "Capturing",
            Self::Saving => "Saving",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reason the capture loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// User pressed the quit key.
    UserRequested,

    /// The control surface went away (terminal closed, script exhausted).
    SurfaceClosed,

    /// The frame source failed too many ticks in a row.
    CaptureLost { message: String },
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::UserRequested => "Stopped by user".to_string(),
            Self::SurfaceClosed => "Control surface closed".to_string(),
            Self::CaptureLost { message } => format!("Capture lost: {message}"),
        }
    }

    /// Returns true for a stop the user asked for.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::CaptureLost { .. })
    }
}
