//! Headless doubles shared by the engine's unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use replay_capture::{CaptureError, CaptureResult, FrameSource, RawFrame, TestPatternSource};
use replay_codec::{
    CodecError, CodecResult, ContainerError, ContainerFormat, ContainerResult, ContainerWriter,
    EncodedFrame, FrameCodec, JpegCodec, VideoConfig,
};
use replay_ipc::{KeyCommand, Region, Resolution};

use crate::error::SurfaceError;
use crate::surface::{ControlSurface, Preview};

/// `count` JPEG frames of a moving test pattern, sequences 0..count.
pub fn encoded_frames(resolution: Resolution, count: usize) -> Vec<EncodedFrame> {
    let codec = JpegCodec::new();
    let mut source = TestPatternSource::new(resolution);
    (0..count)
        .map(|_| codec.encode(&source.grab().unwrap(), 75).unwrap())
        .collect()
}

/// What a [`MemoryFormat`] writer received.
#[derive(Debug, Clone)]
pub struct RecordedClip {
    pub path: PathBuf,
    pub resolution: Resolution,
    pub fps: u32,
    pub sequences: Vec<u64>,
    pub finished: bool,
}

/// Container format that records frames instead of writing files.
#[derive(Clone, Default)]
pub struct MemoryFormat {
    clips: Arc<Mutex<Vec<RecordedClip>>>,
    write_delay: Duration,
}

impl MemoryFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per written frame.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn clips(&self) -> Vec<RecordedClip> {
        self.clips.lock().clone()
    }
}

impl ContainerFormat for MemoryFormat {
    fn extension(&self) -> &'static str {
        "mem"
    }

    fn create(
        &self,
        path: &Path,
        config: &VideoConfig,
    ) -> ContainerResult<Box<dyn ContainerWriter>> {
        let mut clips = self.clips.lock();
        clips.push(RecordedClip {
            path: path.to_path_buf(),
            resolution: config.resolution,
            fps: config.fps,
            sequences: Vec::new(),
            finished: false,
        });

        Ok(Box::new(MemoryWriter {
            clips: Arc::clone(&self.clips),
            slot: clips.len() - 1,
            resolution: config.resolution,
            write_delay: self.write_delay,
            written: 0,
        }))
    }
}

struct MemoryWriter {
    clips: Arc<Mutex<Vec<RecordedClip>>>,
    slot: usize,
    resolution: Resolution,
    write_delay: Duration,
    written: u64,
}

impl ContainerWriter for MemoryWriter {
    fn write_frame(&mut self, frame: &RawFrame) -> ContainerResult<()> {
        if frame.resolution() != self.resolution {
            return Err(ContainerError::FrameRejected {
                expected: self.resolution,
                actual: frame.resolution(),
            });
        }
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.clips.lock()[self.slot].sequences.push(frame.sequence);
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn finish(self: Box<Self>) -> ContainerResult<u64> {
        self.clips.lock()[self.slot].finished = true;
        Ok(self.written)
    }
}

/// JPEG codec whose decode fails for one sequence number.
pub struct FailingDecodeCodec {
    inner: JpegCodec,
    fail_on: u64,
}

impl FailingDecodeCodec {
    pub fn new(fail_on: u64) -> Self {
        Self {
            inner: JpegCodec::new(),
            fail_on,
        }
    }
}

impl FrameCodec for FailingDecodeCodec {
    fn encode(&self, frame: &RawFrame, quality: u8) -> CodecResult<EncodedFrame> {
        self.inner.encode(frame, quality)
    }

    fn decode(&self, frame: &EncodedFrame) -> CodecResult<RawFrame> {
        if frame.sequence == self.fail_on {
            return Err(CodecError::Decoding(format!(
                "injected failure on frame #{}",
                frame.sequence
            )));
        }
        self.inner.decode(frame)
    }

    fn name(&self) -> &'static str {
        "failing-jpeg"
    }
}

/// JPEG codec whose encode fails for one sequence number.
pub struct FailingEncodeCodec {
    inner: JpegCodec,
    fail_on: u64,
}

impl FailingEncodeCodec {
    pub fn new(fail_on: u64) -> Self {
        Self {
            inner: JpegCodec::new(),
            fail_on,
        }
    }
}

impl FrameCodec for FailingEncodeCodec {
    fn encode(&self, frame: &RawFrame, quality: u8) -> CodecResult<EncodedFrame> {
        if frame.sequence == self.fail_on {
            return Err(CodecError::Encoding("injected failure".to_string()));
        }
        self.inner.encode(frame, quality)
    }

    fn decode(&self, frame: &EncodedFrame) -> CodecResult<RawFrame> {
        self.inner.decode(frame)
    }

    fn name(&self) -> &'static str {
        "failing-jpeg"
    }
}

/// Test pattern source that fails on chosen grabs (0-based call index).
pub struct FlakySource {
    inner: TestPatternSource,
    calls: usize,
    fail: Box<dyn Fn(usize) -> bool + Send>,
}

impl FlakySource {
    pub fn new(resolution: Resolution, fail: impl Fn(usize) -> bool + Send + 'static) -> Self {
        Self {
            inner: TestPatternSource::new(resolution),
            calls: 0,
            fail: Box::new(fail),
        }
    }
}

impl FrameSource for FlakySource {
    fn grab(&mut self) -> CaptureResult<RawFrame> {
        let call = self.calls;
        self.calls += 1;
        if (self.fail)(call) {
            return Err(CaptureError::Backend {
                message: format!("injected failure on grab {call}"),
                source: None,
            });
        }
        self.inner.grab()
    }

    fn region(&self) -> Region {
        self.inner.region()
    }

    fn name(&self) -> String {
        "flaky test pattern".to_string()
    }
}

/// One tick's worth of scripted input.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Idle,
    Key(KeyCommand),
}

/// Control surface replaying a fixed script, one step per tick.
#[derive(Clone, Default)]
pub struct ScriptedSurface {
    steps: Arc<Mutex<VecDeque<Step>>>,
    presented: Arc<AtomicUsize>,
    close_at_end: bool,
    fail_present: bool,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle(self, ticks: usize) -> Self {
        self.steps
            .lock()
            .extend(std::iter::repeat(Step::Idle).take(ticks));
        self
    }

    pub fn key(self, command: KeyCommand) -> Self {
        self.steps.lock().push_back(Step::Key(command));
        self
    }

    /// Report the surface as closed once the script runs out.
    pub fn close_at_end(mut self) -> Self {
        self.close_at_end = true;
        self
    }

    /// Make every preview fail.
    pub fn failing_present(mut self) -> Self {
        self.fail_present = true;
        self
    }

    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }
}

impl ControlSurface for ScriptedSurface {
    fn poll_command(&mut self, _timeout: Duration) -> Result<Option<KeyCommand>, SurfaceError> {
        match self.steps.lock().pop_front() {
            Some(Step::Key(command)) => Ok(Some(command)),
            Some(Step::Idle) => Ok(None),
            None if self.close_at_end => Err(SurfaceError::Closed),
            None => Ok(None),
        }
    }

    fn present(&mut self, _preview: &Preview<'_>) -> Result<(), SurfaceError> {
        self.presented.fetch_add(1, Ordering::SeqCst);
        if self.fail_present {
            return Err(SurfaceError::Io(std::io::Error::other("preview unavailable")));
        }
        Ok(())
    }
}
