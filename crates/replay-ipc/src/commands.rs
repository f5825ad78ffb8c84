//! Commands read from the control surface once per tick.

use serde::{Deserialize, Serialize};

/// Key commands the capture loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCommand {
    /// Persist the rolling window to a clip file.
    Clip,

    /// Stop capturing and exit.
    Quit,
}
