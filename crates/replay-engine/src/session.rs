//! Capture session setup: source, codec, container and buffer for one run.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use replay_capture::{FrameSource, ScreenSource, TestPatternSource};
use replay_codec::{AviMjpegFormat, ContainerFormat, FrameCodec, JpegCodec, VideoConfig};
use replay_ipc::{Resolution, SessionConfig, SessionSummary};
use tracing::{debug, info, instrument, warn};

use crate::clip_writer::ClipWriter;
use crate::error::SessionError;
use crate::ring_buffer::RingBuffer;

/// Test pattern size when no region is given.
pub const DEFAULT_PATTERN_RESOLUTION: Resolution = Resolution {
    width: 1280,
    height: 720,
};

/// Everything the capture loop needs, opened once at startup.
pub struct CaptureSession {
    config: SessionConfig,
    source: Box<dyn FrameSource>,
    codec: Arc<dyn FrameCodec>,
    format: Arc<dyn ContainerFormat>,
    buffer: RingBuffer,
    video: VideoConfig,
}

impl CaptureSession {
    /// Validate `config` and open the frame source it names.
    #[instrument(name = "session_open", skip_all)]
    pub fn open(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let output_dir = PathBuf::from(&config.output_dir);
        fs::create_dir_all(&output_dir).map_err(|source| SessionError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let source: Box<dyn FrameSource> = if config.test_pattern {
            let resolution = config
                .region
                .map(|r| r.resolution())
                .unwrap_or(DEFAULT_PATTERN_RESOLUTION);
            Box::new(TestPatternSource::new(resolution))
        } else {
            Box::new(ScreenSource::open(config.monitor, config.region)?)
        };

        Self::with_parts(
            config,
            source,
            Arc::new(JpegCodec::new()),
            Arc::new(AviMjpegFormat::new()),
        )
    }

    /// Assemble a session from already opened parts.
    pub fn with_parts(
        config: SessionConfig,
        source: Box<dyn FrameSource>,
        codec: Arc<dyn FrameCodec>,
        format: Arc<dyn ContainerFormat>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let mut video = VideoConfig::new(source.resolution(), config.fps);
        video.quality = config.jpeg_quality;
        let buffer = RingBuffer::new(config.capacity());

        info!(
            source = %source.name(),
            resolution = %video.resolution,
            fps = config.fps,
            capacity = buffer.capacity(),
            codec = codec.name(),
            "Capture session ready"
        );

        Ok(Self {
            config,
            source,
            codec,
            format,
            buffer,
            video,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Size of every captured frame.
    pub fn resolution(&self) -> Resolution {
        self.video.resolution
    }

    /// Ring buffer capacity in frames.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    pub fn video_config(&self) -> &VideoConfig {
        &self.video
    }

    pub fn source_mut(&mut self) -> &mut dyn FrameSource {
        self.source.as_mut()
    }

    pub fn codec(&self) -> &dyn FrameCodec {
        self.codec.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            source: self.source.name(),
            resolution: self.resolution(),
            fps: self.config.fps,
            seconds_to_keep: self.config.seconds_to_keep,
            capacity: self.capacity(),
            clip_key: self.config.clip_key,
            quit_key: self.config.quit_key,
            pacing: self.config.pacing,
        }
    }

    /// Writer that saves clips into the configured output directory.
    pub fn clip_writer(&self) -> ClipWriter {
        ClipWriter::new(
            &self.config.output_dir,
            Arc::clone(&self.codec),
            Arc::clone(&self.format),
        )
    }

    /// Release the frame source.
    pub fn close(&mut self) {
        match self.source.close() {
            Ok(()) => debug!("Frame source closed"),
            Err(e) => warn!("Failed to close frame source: {}", e),
        }
    }
}
