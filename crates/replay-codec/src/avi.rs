//! Motion-JPEG in a RIFF AVI container.
//!
//! File layout written by [`AviWriter`]:
//! - `RIFF` 'AVI '
//!   - `LIST` 'hdrl'
//!     - `avih`: main header (frame interval, frame count, size)
//!     - `LIST` 'strl'
//!       - `strh`: video stream header ('vids' / 'MJPG', rate = fps)
//!       - `strf`: BITMAPINFOHEADER
//!   - `LIST` 'movi': one `00dc` chunk per JPEG frame, padded to even length
//!   - `idx1`: one 16-byte entry per frame, every frame a keyframe
//!
//! Sizes and frame counts are unknown until the last frame, so the header is
//! written with placeholders and patched in [`ContainerWriter::finish`].

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};
use replay_capture::RawFrame;
use tracing::{debug, instrument, warn};

use crate::error::ContainerError;
use crate::jpeg::JpegCodec;
use crate::{ContainerFormat, ContainerResult, ContainerWriter, EncodedFrame, VideoConfig};

/// JPEG start-of-image marker.
const JPEG_SOI: &[u8] = &[0xFF, 0xD8];

/// Total size of the header block up to and including the 'movi' fourcc.
pub const HEADER_LEN: u64 = 224;

// Offsets of fields patched on finish.
const RIFF_SIZE_OFFSET: u64 = 4;
const AVIH_MAX_BYTES_PER_SEC_OFFSET: u64 = 36;
const AVIH_TOTAL_FRAMES_OFFSET: u64 = 48;
const AVIH_SUGGESTED_BUFFER_OFFSET: u64 = 60;
const STRH_LENGTH_OFFSET: u64 = 140;
const STRH_SUGGESTED_BUFFER_OFFSET: u64 = 144;
const MOVI_SIZE_OFFSET: u64 = 216;
/// Position of the 'movi' fourcc; idx1 offsets are relative to it.
const MOVI_FOURCC_OFFSET: u64 = 220;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK_ID: &[u8; 4] = b"00dc";

/// Writes MJPEG `.avi` clips.
#[derive(Debug, Clone, Copy, Default)]
pub struct AviMjpegFormat;

impl AviMjpegFormat {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerFormat for AviMjpegFormat {
    fn extension(&self) -> &'static str {
        "avi"
    }

    #[instrument(name = "avi_create", skip_all, fields(path = %path.display()))]
    fn create(
        &self,
        path: &Path,
        config: &VideoConfig,
    ) -> ContainerResult<Box<dyn ContainerWriter>> {
        let file = File::create(path)?;
        let writer = AviWriter::new(BufWriter::new(file), config.clone())?;
        Ok(Box::new(writer))
    }
}

/// An MJPEG AVI stream over any seekable output.
pub struct AviWriter<W: Write + Seek> {
    inner: W,
    config: VideoConfig,
    codec: JpegCodec,
    /// (offset relative to 'movi', payload size) per frame.
    index: Vec<(u32, u32)>,
    position: u64,
    largest_chunk: u32,
    finished: bool,
}

impl<W: Write + Seek> AviWriter<W> {
    /// Start a stream, writing the header block.
    pub fn new(mut inner: W, config: VideoConfig) -> ContainerResult<Self> {
        let header = build_header(&config);
        debug_assert_eq!(header.len() as u64, HEADER_LEN);
        inner.write_all(&header)?;

        debug!(
            width = config.resolution.width,
            height = config.resolution.height,
            fps = config.fps,
            "AVI stream opened"
        );

        Ok(Self {
            inner,
            config,
            codec: JpegCodec::new(),
            index: Vec::new(),
            position: HEADER_LEN,
            largest_chunk: 0,
            finished: false,
        })
    }

    fn check_frame(&self, frame: &RawFrame) -> ContainerResult<()> {
        let expected = self.config.resolution;
        if frame.resolution() != expected {
            return Err(ContainerError::FrameRejected {
                expected,
                actual: frame.resolution(),
            });
        }
        if !frame.is_valid() {
            return Err(ContainerError::InvalidFrame(format!(
                "frame #{} has {} bytes for {}",
                frame.sequence,
                frame.data.len(),
                expected
            )));
        }
        Ok(())
    }

    fn write_chunk(&mut self, payload: &[u8]) -> ContainerResult<()> {
        let size = u32::try_from(payload.len()).map_err(|_| ContainerError::TooLarge)?;
        let padded = payload.len() as u64 + (payload.len() as u64 & 1);
        let end = self.position + 8 + padded + (self.index.len() as u64 + 1) * 16;
        if end > u32::MAX as u64 {
            return Err(ContainerError::TooLarge);
        }

        let offset = (self.position - MOVI_FOURCC_OFFSET) as u32;

        self.inner.write_all(FRAME_CHUNK_ID)?;
        self.inner.write_all(&size.to_le_bytes())?;
        self.inner.write_all(payload)?;
        if payload.len() % 2 == 1 {
            self.inner.write_all(&[0])?;
        }

        self.index.push((offset, size));
        self.position += 8 + padded;
        self.largest_chunk = self.largest_chunk.max(size);
        Ok(())
    }

    fn write_trailer(&mut self) -> ContainerResult<()> {
        let movi_end = self.position;

        let mut idx = BytesMut::with_capacity(8 + self.index.len() * 16);
        idx.put_slice(b"idx1");
        idx.put_u32_le((self.index.len() * 16) as u32);
        for &(offset, size) in &self.index {
            idx.put_slice(FRAME_CHUNK_ID);
            idx.put_u32_le(AVIIF_KEYFRAME);
            idx.put_u32_le(offset);
            idx.put_u32_le(size);
        }
        self.inner.write_all(&idx)?;
        let file_end = movi_end + idx.len() as u64;

        let frames = self.index.len() as u32;
        let suggested = self.largest_chunk + 8;
        let bytes_per_sec = (self.largest_chunk as u64 * self.config.fps as u64)
            .min(u32::MAX as u64) as u32;

        self.patch_u32(RIFF_SIZE_OFFSET, (file_end - 8) as u32)?;
        self.patch_u32(AVIH_MAX_BYTES_PER_SEC_OFFSET, bytes_per_sec)?;
        self.patch_u32(AVIH_TOTAL_FRAMES_OFFSET, frames)?;
        self.patch_u32(AVIH_SUGGESTED_BUFFER_OFFSET, suggested)?;
        self.patch_u32(STRH_LENGTH_OFFSET, frames)?;
        self.patch_u32(STRH_SUGGESTED_BUFFER_OFFSET, suggested)?;
        self.patch_u32(MOVI_SIZE_OFFSET, (movi_end - MOVI_FOURCC_OFFSET) as u32)?;

        self.inner.seek(SeekFrom::Start(file_end))?;
        self.inner.flush()?;
        Ok(())
    }

    fn patch_u32(&mut self, offset: u64, value: u32) -> ContainerResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Finish the stream and hand back the underlying output.
    pub fn into_inner(mut self) -> ContainerResult<W>
    where
        W: Default,
    {
        self.write_trailer()?;
        self.finished = true;
        Ok(std::mem::take(&mut self.inner))
    }
}

impl<W: Write + Seek + Send> ContainerWriter for AviWriter<W> {
    fn write_frame(&mut self, frame: &RawFrame) -> ContainerResult<()> {
        self.check_frame(frame)?;
        let jpeg = self.codec.compress(
            &frame.data,
            frame.width,
            frame.height,
            self.config.quality,
        )?;
        self.write_chunk(&jpeg)
    }

    fn write_encoded(
        &mut self,
        encoded: &EncodedFrame,
        decoded: &RawFrame,
    ) -> ContainerResult<()> {
        self.check_frame(decoded)?;
        if encoded.data.starts_with(JPEG_SOI) {
            self.write_chunk(&encoded.data)
        } else {
            self.write_frame(decoded)
        }
    }

    fn frames_written(&self) -> u64 {
        self.index.len() as u64
    }

    fn finish(mut self: Box<Self>) -> ContainerResult<u64> {
        self.write_trailer()?;
        self.finished = true;
        debug!(frames = self.index.len(), bytes = self.position, "AVI stream finished");
        Ok(self.index.len() as u64)
    }
}

impl<W: Write + Seek> Drop for AviWriter<W> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(frames = self.index.len(), "AVI stream closed without trailer");
        }
    }
}

/// Build the header block with placeholder sizes and counts.
fn build_header(config: &VideoConfig) -> Bytes {
    let width = config.resolution.width;
    let height = config.resolution.height;
    let mut buf = BytesMut::with_capacity(HEADER_LEN as usize);

    // RIFF header, size patched on finish
    buf.put_slice(b"RIFF");
    buf.put_u32_le(0);
    buf.put_slice(b"AVI ");

    // hdrl list: 'hdrl' + avih chunk + strl list
    buf.put_slice(b"LIST");
    buf.put_u32_le(4 + (8 + 56) + (8 + 116));
    buf.put_slice(b"hdrl");

    // MainAVIHeader
    buf.put_slice(b"avih");
    buf.put_u32_le(56);
    buf.put_u32_le(config.frame_interval_us()); // dwMicroSecPerFrame
    buf.put_u32_le(0); // dwMaxBytesPerSec
    buf.put_u32_le(0); // dwPaddingGranularity
    buf.put_u32_le(AVIF_HASINDEX); // dwFlags
    buf.put_u32_le(0); // dwTotalFrames
    buf.put_u32_le(0); // dwInitialFrames
    buf.put_u32_le(1); // dwStreams
    buf.put_u32_le(0); // dwSuggestedBufferSize
    buf.put_u32_le(width);
    buf.put_u32_le(height);
    buf.put_bytes(0, 16); // dwReserved[4]

    // strl list: 'strl' + strh chunk + strf chunk
    buf.put_slice(b"LIST");
    buf.put_u32_le(4 + (8 + 56) + (8 + 40));
    buf.put_slice(b"strl");

    // AVIStreamHeader
    buf.put_slice(b"strh");
    buf.put_u32_le(56);
    buf.put_slice(b"vids"); // fccType
    buf.put_slice(b"MJPG"); // fccHandler
    buf.put_u32_le(0); // dwFlags
    buf.put_u16_le(0); // wPriority
    buf.put_u16_le(0); // wLanguage
    buf.put_u32_le(0); // dwInitialFrames
    buf.put_u32_le(1); // dwScale
    buf.put_u32_le(config.fps); // dwRate
    buf.put_u32_le(0); // dwStart
    buf.put_u32_le(0); // dwLength
    buf.put_u32_le(0); // dwSuggestedBufferSize
    buf.put_u32_le(u32::MAX); // dwQuality (-1 = default)
    buf.put_u32_le(0); // dwSampleSize
    buf.put_u16_le(0); // rcFrame.left
    buf.put_u16_le(0); // rcFrame.top
    buf.put_u16_le(width.min(u16::MAX as u32) as u16);
    buf.put_u16_le(height.min(u16::MAX as u32) as u16);

    // BITMAPINFOHEADER
    buf.put_slice(b"strf");
    buf.put_u32_le(40);
    buf.put_u32_le(40); // biSize
    buf.put_i32_le(width as i32);
    buf.put_i32_le(height as i32);
    buf.put_u16_le(1); // biPlanes
    buf.put_u16_le(24); // biBitCount
    buf.put_slice(b"MJPG"); // biCompression
    buf.put_u32_le(RawFrame::rgb_buffer_size(width, height) as u32); // biSizeImage
    buf.put_bytes(0, 16); // pels per meter, colors used/important

    // movi list, size patched on finish
    buf.put_slice(b"LIST");
    buf.put_u32_le(0);
    buf.put_slice(b"movi");

    buf.freeze()
}
