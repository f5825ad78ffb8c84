//! Capture loop counters and reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use replay_ipc::CaptureStats;

/// Collects capture loop statistics.
pub struct CaptureMetrics {
    start_time: Instant,
    frames_captured: AtomicU64,
    capture_errors: AtomicU64,
    encode_drops: AtomicU64,
    overruns: AtomicU64,
    saves_completed: AtomicU64,
    saves_failed: AtomicU64,
    last_report_time: RwLock<Instant>,
    last_frame_count: AtomicU64,
    target_fps: u32,
}

impl CaptureMetrics {
    /// Create a new metrics collector.
    pub fn new(target_fps: u32) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            frames_captured: AtomicU64::new(0),
            capture_errors: AtomicU64::new(0),
            encode_drops: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            saves_failed: AtomicU64::new(0),
            last_report_time: RwLock::new(now),
            last_frame_count: AtomicU64::new(0),
            target_fps,
        }
    }

    /// Record a frame appended to the buffer.
    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick where the source produced nothing.
    pub fn record_capture_error(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame lost to a compression failure.
    pub fn record_encode_drop(&self) {
        self.encode_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick that ran past its interval.
    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self, success: bool) {
        if success {
            self.saves_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.saves_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Frames appended since start.
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Get current stats; `buffered`/`capacity` describe the ring buffer.
    pub fn snapshot(&self, buffered: usize, capacity: usize) -> CaptureStats {
        let now = Instant::now();

        let elapsed = now.duration_since(*self.last_report_time.read());
        let current_frames = self.frames_captured.load(Ordering::Relaxed);
        let last_frames = self.last_frame_count.load(Ordering::Relaxed);

        let fps = if elapsed.as_secs_f32() > 0.0 {
            current_frames.saturating_sub(last_frames) as f32 / elapsed.as_secs_f32()
        } else {
            0.0
        };

        CaptureStats {
            fps,
            target_fps: self.target_fps,
            frames_captured: current_frames,
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            encode_drops: self.encode_drops.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            saves_failed: self.saves_failed.load(Ordering::Relaxed),
            buffered,
            capacity,
            uptime_seconds: now.duration_since(self.start_time).as_secs(),
        }
    }

    /// Update last report time for FPS calculation.
    pub fn mark_reported(&self) {
        *self.last_report_time.write() = Instant::now();
        self.last_frame_count.store(
            self.frames_captured.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
    }
}
