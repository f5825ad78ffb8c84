//! Captured frame types.

use std::time::Instant;

use bytes::Bytes;
use replay_ipc::Resolution;

/// Timestamp for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the frame was captured.
    pub capture_time: Instant,

    /// Offset from the start of capture, in milliseconds.
    pub offset_ms: u64,
}

impl CaptureTimestamp {
    /// Create a new capture timestamp.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let offset_ms = capture_time.duration_since(start_time).as_millis() as u64;

        Self {
            capture_time,
            offset_ms,
        }
    }
}

/// An uncompressed video frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Packed RGB8 pixel data, row-major, no padding.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl RawFrame {
    /// Create a new raw frame.
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        timestamp: CaptureTimestamp,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
            sequence,
        }
    }

    /// Calculate expected RGB8 buffer size for given dimensions.
    pub fn rgb_buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgb_buffer_size(self.width, self.height)
    }
}
