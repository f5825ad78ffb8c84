//! Writes a buffer snapshot out as a video file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use replay_codec::{ContainerFormat, ContainerWriter, FrameCodec, VideoConfig};
use tracing::{debug, info, instrument, warn};

use crate::error::WriteError;
use crate::ring_buffer::Snapshot;

/// Prefix of every clip file name.
pub const CLIP_FILE_PREFIX: &str = "clipe_tela_";

/// strftime pattern for the clip timestamp.
pub const CLIP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A clip written to disk.
#[derive(Debug, Clone)]
pub struct SavedClip {
    pub path: PathBuf,
    pub frames: usize,
    pub elapsed: Duration,
}

/// Decodes snapshot frames and writes them through a container format.
#[derive(Clone)]
pub struct ClipWriter {
    output_dir: PathBuf,
    codec: Arc<dyn FrameCodec>,
    format: Arc<dyn ContainerFormat>,
}

impl ClipWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        codec: Arc<dyn FrameCodec>,
        format: Arc<dyn ContainerFormat>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            codec,
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for a clip saved at `timestamp`.
    pub fn clip_file_name(timestamp: DateTime<Local>, extension: &str) -> String {
        format!(
            "{CLIP_FILE_PREFIX}{}.{extension}",
            timestamp.format(CLIP_TIMESTAMP_FORMAT)
        )
    }

    /// Write every frame of `snapshot`, in order, to a new timestamped file.
    ///
    /// Any decode or container failure aborts the whole save and removes the
    /// partial file; no frame is ever skipped.
    #[instrument(name = "clip_save", skip_all, fields(frames = snapshot.len()))]
    pub fn save(
        &self,
        snapshot: &Snapshot,
        video: &VideoConfig,
    ) -> Result<SavedClip, WriteError> {
        if snapshot.is_empty() {
            return Err(WriteError::EmptySnapshot);
        }

        let started = Instant::now();
        let path = self.next_path(Local::now());
        info!(path = %path.display(), "Saving clip");

        let mut writer = match self.format.create(&path, video) {
            Ok(writer) => writer,
            Err(source) => {
                remove_partial(&path);
                return Err(WriteError::Open { path, source });
            }
        };

        if let Err(e) = self.write_frames(writer.as_mut(), snapshot) {
            drop(writer);
            remove_partial(&path);
            return Err(e);
        }

        if let Err(source) = writer.finish() {
            remove_partial(&path);
            return Err(WriteError::Finish { path, source });
        }

        let clip = SavedClip {
            path,
            frames: snapshot.len(),
            elapsed: started.elapsed(),
        };
        info!(
            path = %clip.path.display(),
            frames = clip.frames,
            elapsed_ms = clip.elapsed.as_millis() as u64,
            "Clip saved"
        );
        Ok(clip)
    }

    fn write_frames(
        &self,
        writer: &mut dyn ContainerWriter,
        snapshot: &Snapshot,
    ) -> Result<(), WriteError> {
        let total = snapshot.len();

        for (index, encoded) in snapshot.iter().enumerate() {
            let raw = self
                .codec
                .decode(encoded)
                .map_err(|source| WriteError::Decode {
                    index,
                    total,
                    source,
                })?;

            writer
                .write_encoded(encoded, &raw)
                .map_err(|source| WriteError::Rejected {
                    index,
                    total,
                    source,
                })?;
        }

        debug!(frames = writer.frames_written(), "All frames written");
        Ok(())
    }

    /// Timestamped path in the output directory; same-second collisions get a numeric suffix.
    fn next_path(&self, now: DateTime<Local>) -> PathBuf {
        let extension = self.format.extension();
        let mut path = self
            .output_dir
            .join(Self::clip_file_name(now, extension));

        let stem = format!("{CLIP_FILE_PREFIX}{}", now.format(CLIP_TIMESTAMP_FORMAT));
        let mut n = 2;
        while path.exists() {
            path = self.output_dir.join(format!("{stem}_{n}.{extension}"));
            n += 1;
        }
        path
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial clip"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove partial clip: {}", e),
    }
}
