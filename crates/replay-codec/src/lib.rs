//! JPEG frame compression and MJPEG/AVI clip writing.
//!
//! Buffered frames are kept JPEG-compressed by a [`FrameCodec`]. When a clip
//! is saved, frames are decoded again and handed to a [`ContainerWriter`]
//! created by a [`ContainerFormat`].

mod avi;
mod error;
mod jpeg;

pub use avi::{AviMjpegFormat, AviWriter};
pub use error::{CodecError, ContainerError};
pub use jpeg::JpegCodec;

use std::path::Path;

use bytes::Bytes;
use replay_capture::{CaptureTimestamp, RawFrame};
use replay_ipc::Resolution;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Default JPEG quality for buffered frames.
pub const DEFAULT_QUALITY: u8 = 90;

/// Clip encoding configuration.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Frame size every written frame must match.
    pub resolution: Resolution,

    /// Playback frames per second.
    pub fps: u32,

    /// Quality hint for formats that recompress (1-100).
    pub quality: u8,
}

impl VideoConfig {
    pub fn new(resolution: Resolution, fps: u32) -> Self {
        Self {
            resolution,
            fps,
            quality: DEFAULT_QUALITY,
        }
    }

    /// Frame duration in microseconds.
    pub fn frame_interval_us(&self) -> u32 {
        1_000_000 / self.fps.max(1)
    }
}

/// A compressed frame as held by the ring buffer.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Compressed payload.
    pub data: Bytes,

    /// Width of the frame the payload decodes to.
    pub width: u32,

    /// Height of the frame the payload decodes to.
    pub height: u32,

    /// Capture timestamp of the source frame.
    pub timestamp: CaptureTimestamp,

    /// Sequence number of the source frame.
    pub sequence: u64,
}

impl EncodedFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Trait for per-frame codecs.
pub trait FrameCodec: Send + Sync {
    /// Compress a raw frame at the given quality (1-100).
    fn encode(&self, frame: &RawFrame, quality: u8) -> CodecResult<EncodedFrame>;

    /// Decompress a frame produced by [`FrameCodec::encode`].
    fn decode(&self, frame: &EncodedFrame) -> CodecResult<RawFrame>;

    /// Get codec name for diagnostics.
    fn name(&self) -> &'static str;
}

/// A video container file format.
pub trait ContainerFormat: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    /// Create a new output at `path`.
    fn create(
        &self,
        path: &Path,
        config: &VideoConfig,
    ) -> ContainerResult<Box<dyn ContainerWriter>>;
}

/// An open container output stream.
pub trait ContainerWriter: Send {
    /// Append one frame. Frames whose size differs from the configured resolution are rejected.
    fn write_frame(&mut self, frame: &RawFrame) -> ContainerResult<()>;

    /// Append a buffered frame together with its decoded pixels.
    ///
    /// Writers that can store the compressed payload as-is override this to
    /// skip a second lossy pass. `decoded` is still checked against the stream.
    fn write_encoded(
        &mut self,
        _encoded: &EncodedFrame,
        decoded: &RawFrame,
    ) -> ContainerResult<()> {
        self.write_frame(decoded)
    }

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;

    /// Write trailers and close the output. Returns the frame count.
    fn finish(self: Box<Self>) -> ContainerResult<u64>;
}
