//! Typed session config, commands and events for the replay recorder.
//!
//! This crate defines the message types exchanged between the capture
//! engine and whatever front-end drives it (terminal, tests).

mod commands;
mod events;
mod state;
mod types;

pub use commands::KeyCommand;
pub use events::ReplayEvent;
pub use state::{ControllerState, StopReason};
pub use types::{
    CaptureStats, ConfigError, PacingMode, Region, Resolution, SessionConfig, SessionSummary,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (engine → front-end).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<ReplayEvent>, Receiver<ReplayEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
