//! Command-line options.

use clap::Parser;
use replay_ipc::{PacingMode, Region, SessionConfig};

#[derive(Debug, Parser)]
#[command(name = "replay", version)]
#[command(about = "Keep the last seconds of the screen and save them on a key press", long_about = None)]
pub struct Cli {
    /// Seconds of footage to keep
    #[arg(short, long, default_value_t = 30)]
    pub seconds: u32,

    /// Capture rate in frames per second
    #[arg(short, long, default_value_t = 30)]
    pub fps: u32,

    /// JPEG quality of buffered frames (1-100)
    #[arg(long, default_value_t = 90)]
    pub quality: u8,

    /// Monitor index from --list-monitors (default: primary)
    #[arg(short, long)]
    pub monitor: Option<usize>,

    /// Capture rectangle relative to the monitor: left,top,width,height
    #[arg(short, long)]
    pub region: Option<Region>,

    /// Directory clips are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Key that saves a clip
    #[arg(long, default_value_t = 'c')]
    pub clip_key: char,

    /// Key that quits
    #[arg(long, default_value_t = 'q')]
    pub quit_key: char,

    /// Tick pacing: fixed or deadline
    #[arg(long, default_value_t = PacingMode::Fixed)]
    pub pacing: PacingMode,

    /// Consecutive failed grabs before giving up
    #[arg(long, default_value_t = 30)]
    pub max_capture_failures: u32,

    /// Capture a synthetic pattern instead of a display
    #[arg(long)]
    pub test_pattern: bool,

    /// List monitors and exit
    #[arg(long)]
    pub list_monitors: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            seconds_to_keep: self.seconds,
            fps: self.fps,
            jpeg_quality: self.quality,
            monitor: self.monitor,
            region: self.region,
            output_dir: self.output_dir.clone(),
            clip_key: self.clip_key,
            quit_key: self.quit_key,
            pacing: self.pacing,
            max_consecutive_capture_failures: self.max_capture_failures,
            test_pattern: self.test_pattern,
        }
    }

    /// Default log level for the replay crates.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
