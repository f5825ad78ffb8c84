//! Synthetic frame source for headless runs and tests.

use std::time::Instant;

use bytes::Bytes;
use replay_ipc::{Region, Resolution};

use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, RawFrame};
use crate::{CaptureResult, FrameSource};

/// Produces a moving RGB gradient of a fixed size.
///
/// The first eight bytes of every frame carry the little-endian sequence number.
pub struct TestPatternSource {
    resolution: Resolution,
    sequence: u64,
    start_time: Instant,
    closed: bool,
}

impl TestPatternSource {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            sequence: 0,
            start_time: Instant::now(),
            closed: false,
        }
    }

    /// Number of frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.sequence
    }

    fn render(&self) -> Vec<u8> {
        let w = self.resolution.width as usize;
        let h = self.resolution.height as usize;
        let shift = self.sequence as usize;
        let size = RawFrame::rgb_buffer_size(self.resolution.width, self.resolution.height);
        let mut data = vec![0u8; size];

        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 3;
                data[i] = ((x + shift) * 255 / w.max(1)) as u8;
                data[i + 1] = (y * 255 / h.max(1)) as u8;
                data[i + 2] = (shift % 256) as u8;
            }
        }

        let stamp = self.sequence.to_le_bytes();
        let n = stamp.len().min(data.len());
        data[..n].copy_from_slice(&stamp[..n]);
        data
    }
}

impl FrameSource for TestPatternSource {
    fn grab(&mut self) -> CaptureResult<RawFrame> {
        if self.closed {
            return Err(CaptureError::Closed);
        }

        let data = self.render();
        let frame = RawFrame::new(
            Bytes::from(data),
            self.resolution.width,
            self.resolution.height,
            CaptureTimestamp::now(self.start_time),
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn region(&self) -> Region {
        Region::full(self.resolution)
    }

    fn name(&self) -> String {
        format!("Test pattern {}", self.resolution)
    }

    fn close(&mut self) -> CaptureResult<()> {
        self.closed = true;
        Ok(())
    }
}
