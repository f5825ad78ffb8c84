//! Common types shared by the engine and its front-ends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel dimensions of a capture area or clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame.
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A capture rectangle, relative to the top-left corner of the selected monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Region covering a whole area of the given size.
    pub fn full(resolution: Resolution) -> Self {
        Self::new(0, 0, resolution.width, resolution.height)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Returns true if the region lies entirely inside an area of the given size.
    pub fn fits_within(&self, bounds: Resolution) -> bool {
        let right = self.left as u64 + self.width as u64;
        let bottom = self.top as u64 + self.height as u64;
        right <= bounds.width as u64 && bottom <= bounds.height as u64
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    /// Parses `left,top,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::InvalidRegion(s.to_string()))?;

        match parts.as_slice() {
            [left, top, width, height] => Ok(Self::new(*left, *top, *width, *height)),
            _ => Err(ConfigError::InvalidRegion(s.to_string())),
        }
    }
}

/// How the capture loop spaces its ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacingMode {
    /// Sleep `interval - elapsed` after each tick. Overruns are not made up.
    #[default]
    Fixed,

    /// Follow a monotonic deadline schedule, shortening sleeps after an overrun.
    Deadline,
}

impl FromStr for PacingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "deadline" => Ok(Self::Deadline),
            other => Err(ConfigError::InvalidPacing(other.to_string())),
        }
    }
}

impl fmt::Display for PacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Deadline => f.write_str("deadline"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("fps must be greater than zero")]
    ZeroFps,

    #[error("seconds to keep must be greater than zero")]
    ZeroDuration,

    #[error("JPEG quality must be within 1..=100, got {0}")]
    InvalidQuality(u8),

    #[error("clip and quit keys must differ (both '{0}')")]
    KeyConflict(char),

    #[error("invalid region '{0}', expected left,top,width,height")]
    InvalidRegion(String),

    #[error("region must have a non-zero width and height")]
    EmptyRegion,

    #[error("unknown pacing mode '{0}', expected 'fixed' or 'deadline'")]
    InvalidPacing(String),

    #[error("{seconds}s at {fps} fps exceeds the {max} frame buffer limit")]
    WindowTooLarge { seconds: u32, fps: u32, max: usize },
}

/// Capture session parameters, chosen once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Length of the rolling window, in seconds.
    pub seconds_to_keep: u32,

    /// Target capture rate.
    pub fps: u32,

    /// JPEG quality used when compressing buffered frames (1-100).
    pub jpeg_quality: u8,

    /// Monitor index in enumeration order (None for the primary monitor).
    pub monitor: Option<usize>,

    /// Sub-rectangle of the monitor to capture (None for the whole monitor).
    pub region: Option<Region>,

    /// Directory clip files are written to.
    pub output_dir: String,

    /// Key that saves a clip.
    pub clip_key: char,

    /// Key that quits.
    pub quit_key: char,

    /// Tick spacing strategy.
    pub pacing: PacingMode,

    /// Consecutive failed grabs tolerated before the loop gives up.
    pub max_consecutive_capture_failures: u32,

    /// Capture a synthetic pattern instead of a display.
    pub test_pattern: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seconds_to_keep: 30,
            fps: 30,
            jpeg_quality: 90,
            monitor: None,
            region: None,
            output_dir: ".".to_string(),
            clip_key: 'c',
            quit_key: 'q',
            pacing: PacingMode::Fixed,
            max_consecutive_capture_failures: 30,
            test_pattern: false,
        }
    }
}

impl SessionConfig {
    /// Largest replay window, in frames. One hour at 30 fps.
    pub const MAX_BUFFERED_FRAMES: usize = 108_000;

    /// Number of frames held by the ring buffer.
    pub fn capacity(&self) -> usize {
        (self.seconds_to_keep as usize).saturating_mul(self.fps as usize)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        if self.seconds_to_keep == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        match (self.seconds_to_keep as usize).checked_mul(self.fps as usize) {
            Some(frames) if frames <= Self::MAX_BUFFERED_FRAMES => {}
            _ => {
                return Err(ConfigError::WindowTooLarge {
                    seconds: self.seconds_to_keep,
                    fps: self.fps,
                    max: Self::MAX_BUFFERED_FRAMES,
                })
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        if self.clip_key.eq_ignore_ascii_case(&self.quit_key) {
            return Err(ConfigError::KeyConflict(self.clip_key));
        }
        if let Some(region) = self.region {
            if region.width == 0 || region.height == 0 {
                return Err(ConfigError::EmptyRegion);
            }
        }
        Ok(())
    }
}

/// Startup summary printed once the session is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Human-readable name of the frame source.
    pub source: String,
    pub resolution: Resolution,
    pub fps: u32,
    pub seconds_to_keep: u32,
    pub capacity: usize,
    pub clip_key: char,
    pub quit_key: char,
    pub pacing: PacingMode,
}

/// Capture loop statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Effective frames per second since the previous report.
    pub fps: f32,

    /// Target frames per second.
    pub target_fps: u32,

    /// Frames appended to the ring buffer.
    pub frames_captured: u64,

    /// Ticks where the source failed to produce a frame.
    pub capture_errors: u64,

    /// Frames dropped because compression failed.
    pub encode_drops: u64,

    /// Ticks whose work exceeded the frame interval.
    pub overruns: u64,

    /// Clips written.
    pub saves_completed: u64,

    /// Saves aborted.
    pub saves_failed: u64,

    /// Frames currently buffered.
    pub buffered: usize,

    /// Ring buffer capacity.
    pub capacity: usize,

    /// Seconds since capture started.
    pub uptime_seconds: u64,
}

impl CaptureStats {
    /// Buffer fill as a percentage.
    pub fn fill_percent(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            self.buffered as f32 * 100.0 / self.capacity as f32
        }
    }
}
