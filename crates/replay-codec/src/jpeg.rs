//! JPEG frame codec.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use replay_capture::RawFrame;
use replay_ipc::Resolution;
use tracing::{instrument, trace};

use crate::error::CodecError;
use crate::{CodecResult, EncodedFrame, FrameCodec};

/// Lossy JPEG compression of RGB8 frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }

    /// Compress packed RGB8 pixels into a JPEG payload.
    pub fn compress(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> CodecResult<Vec<u8>> {
        let expected = RawFrame::rgb_buffer_size(width, height);
        if rgb.len() != expected {
            return Err(CodecError::InvalidInput(format!(
                "Expected {} bytes ({}x{} RGB), got {}",
                expected,
                width,
                height,
                rgb.len()
            )));
        }

        let mut out = Vec::with_capacity(expected / 8);
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode(rgb, width, height, ExtendedColorType::Rgb8)
            .map_err(|e| CodecError::Encoding(format!("JPEG encode failed: {e}")))?;

        Ok(out)
    }
}

impl FrameCodec for JpegCodec {
    #[instrument(name = "jpeg_encode", skip_all, fields(sequence = frame.sequence))]
    fn encode(&self, frame: &RawFrame, quality: u8) -> CodecResult<EncodedFrame> {
        let data = self.compress(&frame.data, frame.width, frame.height, quality)?;

        trace!(
            raw = frame.data.len(),
            compressed = data.len(),
            "Encoded frame"
        );

        Ok(EncodedFrame {
            data: Bytes::from(data),
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            sequence: frame.sequence,
        })
    }

    fn decode(&self, frame: &EncodedFrame) -> CodecResult<RawFrame> {
        let image = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
            .map_err(|e| CodecError::Decoding(format!("frame #{}: {e}", frame.sequence)))?
            .to_rgb8();

        let actual = Resolution::new(image.width(), image.height());
        if actual != frame.resolution() {
            return Err(CodecError::DimensionMismatch {
                expected: frame.resolution(),
                actual,
            });
        }

        Ok(RawFrame::new(
            Bytes::from(image.into_raw()),
            frame.width,
            frame.height,
            frame.timestamp,
            frame.sequence,
        ))
    }

    fn name(&self) -> &'static str {
        "jpeg"
    }
}
