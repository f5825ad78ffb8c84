//! Replay recorder application library.

mod cli;
mod console;
mod terminal;

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use replay_capture::enumerate_monitors;
use replay_engine::{CaptureController, CaptureSession};

pub use cli::Cli;
pub use console::{format_event, OutputFormat};
pub use terminal::{map_key, status_line, TerminalSurface};

/// Crates whose log level the command-line flags control.
const LOG_TARGETS: [&str; 5] = [
    "replay",
    "replay_lib",
    "replay_engine",
    "replay_capture",
    "replay_codec",
];

/// Stderr writer that emits `\r\n` line endings so logs stay readable in raw mode.
pub struct RawModeWriter<W: Write> {
    inner: W,
}

impl<W: Write> RawModeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for RawModeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, byte) in buf.iter().enumerate() {
            if *byte == b'\n' && (i == 0 || buf[i - 1] != b'\r') {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Initialize logging.
fn init_logging(level: &str) {
    let default_filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer().with_writer(|| RawModeWriter::new(io::stderr())),
        )
        .init();
}

/// Parse the command line and run until the user quits.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    if cli.list_monitors {
        return list_monitors();
    }

    info!("Replay recorder starting");
    let config = cli.session_config();
    let session = CaptureSession::open(config).context("Failed to start capture")?;

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let (event_tx, event_rx) = replay_ipc::event_channel();
    let printer = console::spawn_printer(event_rx, format);

    let surface = TerminalSurface::new(cli.clip_key, cli.quit_key)
        .context("Failed to put the terminal in raw mode")?;

    let mut controller = CaptureController::new(session, Box::new(surface), event_tx);
    let reason = controller.run();

    // Dropping the controller restores the terminal and closes the event channel.
    drop(controller);
    if printer.join().is_err() {
        error!("Event printer panicked");
    }

    if !reason.is_clean() {
        bail!(reason.message());
    }

    info!("Replay recorder stopped");
    Ok(())
}

fn list_monitors() -> Result<()> {
    let monitors = enumerate_monitors().context("Failed to enumerate monitors")?;
    for monitor in &monitors {
        println!("{monitor}");
    }
    Ok(())
}
