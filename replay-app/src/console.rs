//! Prints engine events for the user.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use replay_ipc::ReplayEvent;
use tracing::{debug, warn};

/// How events are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Status lines for a person at the terminal.
    Human,

    /// One JSON object per event.
    Json,
}

/// Drain `events` on a background thread until the sender side is dropped.
pub fn spawn_printer(events: Receiver<ReplayEvent>, format: OutputFormat) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdout = io::stdout();
        for event in events.iter() {
            let line = match format {
                OutputFormat::Human => match format_event(&event) {
                    Some(line) => line,
                    None => continue,
                },
                OutputFormat::Json => match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        continue;
                    }
                },
            };

            let mut out = stdout.lock();
            // The terminal is in raw mode; clear the status line and return the carriage.
            if writeln!(out, "\r\x1b[K{line}\r").and_then(|_| out.flush()).is_err() {
                break;
            }
        }
        debug!("Event printer stopped");
    })
}

/// Human-readable line for an event, or None for events only worth logging.
pub fn format_event(event: &ReplayEvent) -> Option<String> {
    let line = match event {
        ReplayEvent::Started(summary) => format!(
            "Keeping the last {}s of {} ({} @ {} fps, {} frames). Press '{}' to save a clip, '{}' to quit.",
            summary.seconds_to_keep,
            summary.source,
            summary.resolution,
            summary.fps,
            summary.capacity,
            summary.clip_key,
            summary.quit_key
        ),
        ReplayEvent::BufferNotReady {
            held,
            capacity,
            seconds_to_keep,
        } => format!(
            "Buffer not full yet ({held}/{capacity} frames); wait until {seconds_to_keep}s have been captured."
        ),
        ReplayEvent::SaveBusy => "Still saving the previous clip, try again shortly.".to_string(),
        ReplayEvent::SaveStarted { frames } => format!("Saving clip ({frames} frames)..."),
        ReplayEvent::SaveCompleted {
            path,
            frames,
            elapsed_ms,
        } => format!("Clip saved: {path} ({frames} frames, {elapsed_ms} ms)"),
        ReplayEvent::SaveFailed { message } => format!("Clip not saved: {message}"),
        ReplayEvent::Stopped { reason } => format!("{}. Shutting down.", reason.message()),
        ReplayEvent::StateChanged { .. } | ReplayEvent::Stats(_) => return None,
    };
    Some(line)
}
