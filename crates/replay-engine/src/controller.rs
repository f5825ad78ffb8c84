//! The capture loop and its CAPTURING / SAVING / STOPPED state machine.

use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use replay_capture::RawFrame;
use replay_ipc::{CaptureStats, ControllerState, KeyCommand, ReplayEvent, StopReason};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{SaveRequestError, SurfaceError};
use crate::metrics::CaptureMetrics;
use crate::pacer::Pacer;
use crate::save_worker::{SaveJob, SaveReport, SaveWorker};
use crate::session::CaptureSession;
use crate::surface::{ControlSurface, Preview};

/// How often capture statistics are logged and emitted.
pub const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Drives one capture session until quit or an unrecoverable capture failure.
///
/// Every tick grabs, compresses and buffers one frame, shows a preview, and
/// polls for a key command within the pacer's remaining budget. Saves run on
/// a [`SaveWorker`]; capture keeps appending while the controller is in
/// [`ControllerState::Saving`].
pub struct CaptureController {
    session: CaptureSession,
    surface: Box<dyn ControlSurface>,
    event_tx: Sender<ReplayEvent>,
    state: ControllerState,
    pacer: Pacer,
    worker: SaveWorker,
    metrics: CaptureMetrics,
    consecutive_failures: u32,
    stop_reason: Option<StopReason>,
    last_stats: Instant,
}

impl CaptureController {
    pub fn new(
        session: CaptureSession,
        surface: Box<dyn ControlSurface>,
        event_tx: Sender<ReplayEvent>,
    ) -> Self {
        let config = session.config();
        let pacer = Pacer::new(config.fps, config.pacing);
        let metrics = CaptureMetrics::new(config.fps);
        let worker = SaveWorker::spawn(session.clip_writer());

        Self {
            session,
            surface,
            event_tx,
            state: ControllerState::Capturing,
            pacer,
            worker,
            metrics,
            consecutive_failures: 0,
            stop_reason: None,
            last_stats: Instant::now(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Current statistics.
    pub fn stats(&self) -> CaptureStats {
        let buffer = self.session.buffer();
        self.metrics.snapshot(buffer.len(), buffer.capacity())
    }

    /// Run until stopped, then release the session.
    #[instrument(name = "capture_run", skip_all)]
    pub fn run(&mut self) -> StopReason {
        let summary = self.session.summary();
        info!(
            source = %summary.source,
            resolution = %summary.resolution,
            fps = summary.fps,
            seconds = summary.seconds_to_keep,
            pacing = %summary.pacing,
            "Capture started"
        );
        self.send_event(ReplayEvent::Started(summary));

        while !self.tick().is_stopped() {}

        self.shutdown()
    }

    /// Run a single loop iteration and return the resulting state.
    pub fn tick(&mut self) -> ControllerState {
        if self.state.is_stopped() {
            return self.state;
        }
        let started = Instant::now();

        self.poll_save();

        if let Some(frame) = self.capture_frame() {
            self.present(&frame);
        }
        if self.state.is_stopped() {
            return self.state;
        }

        self.handle_input(started);
        self.maybe_report_stats();

        if !self.state.is_stopped() {
            let timing = self.pacer.finish(started);
            if timing.overrun {
                self.metrics.record_overrun();
                trace!(elapsed_ms = timing.elapsed.as_millis() as u64, "Tick overran");
            }
        }

        self.state
    }

    /// Snapshot the buffer and hand it to the save worker.
    ///
    /// Returns the number of frames queued. A buffer that is not yet full or
    /// a save still in flight is reported as a notice and leaves the state
    /// and the buffer untouched.
    pub fn request_clip(&mut self) -> Result<usize, SaveRequestError> {
        if self.worker.is_busy() {
            info!("Clip already being saved, request ignored");
            self.send_event(ReplayEvent::SaveBusy);
            return Err(SaveRequestError::Busy);
        }

        let held = self.session.buffer().len();
        let capacity = self.session.buffer().capacity();
        if !self.session.buffer().is_full() {
            let seconds_to_keep = self.session.config().seconds_to_keep;
            info!(held, capacity, "Buffer not full yet, clip not saved");
            self.send_event(ReplayEvent::BufferNotReady {
                held,
                capacity,
                seconds_to_keep,
            });
            return Err(SaveRequestError::BufferNotReady { held, capacity });
        }

        let snapshot = self.session.buffer().snapshot();
        let frames = snapshot.len();
        let job = SaveJob {
            snapshot,
            video: self.session.video_config().clone(),
        };

        if let Err(e) = self.worker.submit(job) {
            self.send_event(ReplayEvent::SaveBusy);
            return Err(e);
        }

        info!(frames, "Clip save started");
        self.send_event(ReplayEvent::SaveStarted { frames });
        self.transition_to(ControllerState::Saving);
        Ok(frames)
    }

    fn capture_frame(&mut self) -> Option<RawFrame> {
        let raw = match self.session.source_mut().grab() {
            Ok(frame) => {
                self.consecutive_failures = 0;
                frame
            }
            Err(e) => {
                self.metrics.record_capture_error();
                self.consecutive_failures += 1;
                warn!(failures = self.consecutive_failures, "Capture failed: {}", e);

                let limit = self.session.config().max_consecutive_capture_failures;
                if self.consecutive_failures >= limit {
                    error!(
                        failures = self.consecutive_failures,
                        "Capture source lost, stopping"
                    );
                    self.stop(StopReason::CaptureLost {
                        message: e.to_string(),
                    });
                }
                return None;
            }
        };

        let quality = self.session.video_config().quality;
        match self.session.codec().encode(&raw, quality) {
            Ok(encoded) => {
                self.session.buffer().append(encoded);
                self.metrics.record_frame();

                let captured = self.metrics.frames_captured();
                if captured <= 3 || captured % 300 == 0 {
                    debug!(
                        sequence = raw.sequence,
                        buffered = self.session.buffer().len(),
                        "Frame buffered"
                    );
                }
            }
            Err(e) => {
                self.metrics.record_encode_drop();
                warn!(sequence = raw.sequence, "Dropping frame: {}", e);
            }
        }

        Some(raw)
    }

    fn present(&mut self, frame: &RawFrame) {
        let buffer = self.session.buffer();
        let preview = Preview {
            frame,
            state: self.state,
            buffered: buffer.len(),
            capacity: buffer.capacity(),
            frames_captured: self.metrics.frames_captured(),
            target_fps: self.session.config().fps,
        };

        if let Err(e) = self.surface.present(&preview) {
            debug!("Preview failed: {}", e);
        }
    }

    fn handle_input(&mut self, started: Instant) {
        let timeout = self.pacer.remaining(started);

        match self.surface.poll_command(timeout) {
            Ok(Some(KeyCommand::Quit)) => {
                info!("Quit requested");
                self.stop(StopReason::UserRequested);
            }
            Ok(Some(KeyCommand::Clip)) => {
                if let Err(e) = self.request_clip() {
                    debug!("Clip request not accepted: {}", e);
                }
            }
            Ok(None) => {}
            Err(SurfaceError::Closed) => {
                info!("Control surface closed");
                self.stop(StopReason::SurfaceClosed);
            }
            Err(e) => warn!("Failed to read key input: {}", e),
        }
    }

    fn poll_save(&mut self) {
        if let Some(report) = self.worker.poll() {
            self.handle_save_report(report);
        }
    }

    fn handle_save_report(&mut self, report: SaveReport) {
        match report.result {
            Ok(clip) => {
                self.metrics.record_save(true);
                self.send_event(ReplayEvent::SaveCompleted {
                    path: clip.path.display().to_string(),
                    frames: clip.frames,
                    elapsed_ms: clip.elapsed.as_millis() as u64,
                });
            }
            Err(e) => {
                error!(frames = report.frames, "Clip save failed: {}", e);
                self.metrics.record_save(false);
                self.send_event(ReplayEvent::SaveFailed {
                    message: e.to_string(),
                });
            }
        }

        if self.state.is_saving() {
            self.transition_to(ControllerState::Capturing);
        }
    }

    fn maybe_report_stats(&mut self) {
        if self.last_stats.elapsed() < STATS_INTERVAL {
            return;
        }

        let stats = self.stats();
        info!(
            "Capture stats: fps={:.1}/{}, captured={}, buffered={}/{} ({:.0}%), errors={}, drops={}, overruns={}, uptime={}s",
            stats.fps,
            stats.target_fps,
            stats.frames_captured,
            stats.buffered,
            stats.capacity,
            stats.fill_percent(),
            stats.capture_errors,
            stats.encode_drops,
            stats.overruns,
            stats.uptime_seconds
        );
        self.send_event(ReplayEvent::Stats(stats));
        self.metrics.mark_reported();
        self.last_stats = Instant::now();
    }

    fn stop(&mut self, reason: StopReason) {
        if self.state.is_stopped() {
            return;
        }
        self.stop_reason = Some(reason);
        self.transition_to(ControllerState::Stopped);
    }

    /// Wait for an in-flight save, release the source and report the stop.
    fn shutdown(&mut self) -> StopReason {
        if let Some(report) = self.worker.shutdown() {
            self.handle_save_report(report);
        }
        self.session.close();

        let reason = self
            .stop_reason
            .clone()
            .unwrap_or(StopReason::UserRequested);
        let stats = self.stats();
        info!(
            reason = %reason.message(),
            frames = stats.frames_captured,
            saves = stats.saves_completed,
            "Capture stopped"
        );
        self.send_event(ReplayEvent::Stopped {
            reason: reason.clone(),
        });
        reason
    }

    fn transition_to(&mut self, new_state: ControllerState) {
        let previous = self.state;
        if previous == new_state {
            return;
        }
        self.state = new_state;

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.send_event(ReplayEvent::StateChanged {
            previous,
            current: new_state,
        });
    }

    fn send_event(&self, event: ReplayEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossbeam_channel::Receiver;
    use replay_capture::{FrameSource, TestPatternSource};
    use replay_codec::{AviMjpegFormat, ContainerFormat, FrameCodec, JpegCodec};
    use replay_ipc::{Resolution, SessionConfig};

    use super::*;
    use crate::testing::{
        FailingDecodeCodec, FailingEncodeCodec, FlakySource, MemoryFormat, ScriptedSurface,
    };

    const RES: Resolution = Resolution {
        width: 32,
        height: 24,
    };

    fn config(seconds_to_keep: u32, fps: u32, output_dir: &str) -> SessionConfig {
        SessionConfig {
            seconds_to_keep,
            fps,
            output_dir: output_dir.to_string(),
            test_pattern: true,
            ..Default::default()
        }
    }

    fn controller(
        config: SessionConfig,
        source: Box<dyn FrameSource>,
        codec: Arc<dyn FrameCodec>,
        format: Arc<dyn ContainerFormat>,
        surface: ScriptedSurface,
    ) -> (CaptureController, Receiver<ReplayEvent>) {
        let session = CaptureSession::with_parts(config, source, codec, format).unwrap();
        let (event_tx, event_rx) = replay_ipc::event_channel();
        let controller = CaptureController::new(session, Box::new(surface), event_tx);
        (controller, event_rx)
    }

    fn pattern() -> Box<dyn FrameSource> {
        Box::new(TestPatternSource::new(RES))
    }

    fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn sequences(controller: &CaptureController) -> Vec<u64> {
        let snapshot = controller.session().buffer().snapshot();
        snapshot.iter().map(|f| f.sequence).collect()
    }

    /// Tick until the pending save has been reported back.
    fn tick_until_capturing(controller: &mut CaptureController) {
        for _ in 0..200 {
            if controller.tick().is_capturing() {
                return;
            }
        }
        panic!("save never completed");
    }

    #[test]
    fn test_clip_before_buffer_full_is_a_notice() {
        let format = MemoryFormat::new();
        let surface = ScriptedSurface::new().idle(4).key(KeyCommand::Clip);
        let (mut controller, events) = controller(
            config(2, 10, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(format.clone()),
            surface,
        );

        for _ in 0..5 {
            assert_eq!(controller.tick(), ControllerState::Capturing);
        }
        let before = sequences(&controller);
        assert_eq!(before, vec![0, 1, 2, 3, 4]);

        assert_eq!(
            controller.request_clip(),
            Err(SaveRequestError::BufferNotReady {
                held: 5,
                capacity: 20
            })
        );
        assert_eq!(controller.state(), ControllerState::Capturing);
        assert_eq!(sequences(&controller), before);
        assert!(format.clips().is_empty());

        let notices: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, ReplayEvent::BufferNotReady { .. }))
            .collect();
        // One from the scripted key, one from the direct request.
        assert_eq!(notices.len(), 2);
        assert!(matches!(
            notices[0],
            ReplayEvent::BufferNotReady {
                held: 5,
                capacity: 20,
                seconds_to_keep: 2
            }
        ));
    }

    #[test]
    fn test_full_buffer_saves_every_frame_in_order() {
        let format = MemoryFormat::new();
        let surface = ScriptedSurface::new()
            .idle(19)
            .key(KeyCommand::Clip)
            .idle(2)
            .key(KeyCommand::Quit);
        let (mut controller, _events) = controller(
            config(2, 10, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(format.clone()),
            surface,
        );

        assert_eq!(controller.run(), StopReason::UserRequested);

        let clips = format.clips();
        assert_eq!(clips.len(), 1);
        assert!(clips[0].finished);
        assert_eq!(clips[0].sequences, (0..20).collect::<Vec<u64>>());
        assert_eq!(clips[0].resolution, RES);
        assert_eq!(clips[0].fps, 10);
    }

    #[test]
    fn test_end_to_end_avi_clip() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().to_string_lossy().to_string();
        let surface = ScriptedSurface::new().idle(19).key(KeyCommand::Clip);
        let (mut controller, events) = controller(
            config(2, 10, &output_dir),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(AviMjpegFormat::new()),
            surface,
        );

        for _ in 0..19 {
            controller.tick();
        }
        assert_eq!(controller.session().buffer().len(), 19);
        assert_eq!(controller.tick(), ControllerState::Saving);
        tick_until_capturing(&mut controller);

        // Saving never drains the live buffer.
        assert_eq!(controller.session().buffer().len(), 20);

        let path = events
            .try_iter()
            .find_map(|e| match e {
                ReplayEvent::SaveCompleted { path, frames, .. } => {
                    assert_eq!(frames, 20);
                    Some(path)
                }
                _ => None,
            })
            .expect("clip saved");

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(read_u32(&data, 32), 100_000);
        assert_eq!(read_u32(&data, 48), 20);
        assert_eq!(read_u32(&data, 64), RES.width);
        assert_eq!(read_u32(&data, 68), RES.height);
        assert_eq!(read_u32(&data, 132), 10);
        assert_eq!(read_u32(&data, 140), 20);
    }

    #[test]
    fn test_decode_failure_aborts_save_but_not_capture() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().to_string_lossy().to_string();
        let surface = ScriptedSurface::new().idle(19).key(KeyCommand::Clip);
        let (mut controller, events) = controller(
            config(2, 10, &output_dir),
            pattern(),
            Arc::new(FailingDecodeCodec::new(5)),
            Arc::new(AviMjpegFormat::new()),
            surface,
        );

        for _ in 0..20 {
            controller.tick();
        }
        assert_eq!(controller.state(), ControllerState::Saving);
        let captured_at_request = controller.stats().frames_captured;
        tick_until_capturing(&mut controller);

        assert_eq!(controller.session().buffer().len(), 20);
        assert!(controller.stats().frames_captured > captured_at_request);
        assert_eq!(controller.stats().saves_failed, 1);

        let failed = events
            .try_iter()
            .find_map(|e| match e {
                ReplayEvent::SaveFailed { message } => Some(message),
                _ => None,
            })
            .expect("save failure reported");
        assert!(failed.contains("frame 5 of 20"));

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(files.is_empty());
    }

    #[test]
    fn test_clip_while_saving_is_busy() {
        let format = MemoryFormat::new().with_write_delay(Duration::from_millis(50));
        let surface = ScriptedSurface::new()
            .idle(9)
            .key(KeyCommand::Clip)
            .key(KeyCommand::Clip);
        let (mut controller, events) = controller(
            config(1, 10, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(format.clone()),
            surface,
        );

        for _ in 0..11 {
            controller.tick();
        }
        assert_eq!(controller.state(), ControllerState::Saving);
        tick_until_capturing(&mut controller);

        let events: Vec<_> = events.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, ReplayEvent::SaveBusy)));
        let started = events
            .iter()
            .filter(|e| matches!(e, ReplayEvent::SaveStarted { .. }))
            .count();
        assert_eq!(started, 1);
        assert_eq!(format.clips().len(), 1);
    }

    #[test]
    fn test_quit_waits_for_in_flight_save() {
        let format = MemoryFormat::new().with_write_delay(Duration::from_millis(10));
        let surface = ScriptedSurface::new()
            .idle(9)
            .key(KeyCommand::Clip)
            .key(KeyCommand::Quit);
        let (mut controller, events) = controller(
            config(1, 10, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(format.clone()),
            surface,
        );

        assert_eq!(controller.run(), StopReason::UserRequested);
        assert_eq!(controller.state(), ControllerState::Stopped);

        let clips = format.clips();
        assert_eq!(clips.len(), 1);
        assert!(clips[0].finished);

        let events: Vec<_> = events.try_iter().collect();
        assert!(matches!(events.first(), Some(ReplayEvent::Started(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e, ReplayEvent::SaveCompleted { frames: 10, .. })));
        assert!(matches!(
            events.last(),
            Some(ReplayEvent::Stopped {
                reason: StopReason::UserRequested
            })
        ));
    }

    #[test]
    fn test_encode_failure_drops_only_that_frame() {
        let surface = ScriptedSurface::new().idle(6);
        let (mut controller, _events) = controller(
            config(1, 50, "."),
            pattern(),
            Arc::new(FailingEncodeCodec::new(3)),
            Arc::new(MemoryFormat::new()),
            surface,
        );

        for _ in 0..6 {
            controller.tick();
        }
        assert_eq!(sequences(&controller), vec![0, 1, 2, 4, 5]);
        let stats = controller.stats();
        assert_eq!(stats.encode_drops, 1);
        assert_eq!(stats.frames_captured, 5);
        assert_eq!(controller.state(), ControllerState::Capturing);
    }

    #[test]
    fn test_capture_lost_after_consecutive_failures() {
        let mut config = config(1, 50, ".");
        config.max_consecutive_capture_failures = 3;
        let source = FlakySource::new(RES, |call| call >= 2);
        let (mut controller, events) = controller(
            config,
            Box::new(source),
            Arc::new(JpegCodec::new()),
            Arc::new(MemoryFormat::new()),
            ScriptedSurface::new(),
        );

        let reason = controller.run();
        assert!(matches!(reason, StopReason::CaptureLost { .. }));
        assert!(!reason.is_clean());
        assert_eq!(controller.session().buffer().len(), 2);
        assert_eq!(controller.stats().capture_errors, 3);
        assert!(events
            .try_iter()
            .any(|e| matches!(e, ReplayEvent::Stopped { reason: StopReason::CaptureLost { .. } })));
    }

    #[test]
    fn test_intermittent_capture_failures_are_tolerated() {
        let mut config = config(1, 50, ".");
        config.max_consecutive_capture_failures = 2;
        let source = FlakySource::new(RES, |call| call % 2 == 0);
        let surface = ScriptedSurface::new().idle(9).key(KeyCommand::Quit);
        let (mut controller, _events) = controller(
            config,
            Box::new(source),
            Arc::new(JpegCodec::new()),
            Arc::new(MemoryFormat::new()),
            surface,
        );

        assert_eq!(controller.run(), StopReason::UserRequested);
        let stats = controller.stats();
        assert_eq!(stats.capture_errors, 5);
        assert_eq!(stats.frames_captured, 5);
    }

    #[test]
    fn test_preview_failure_is_not_fatal() {
        let surface = ScriptedSurface::new()
            .failing_present()
            .idle(5)
            .key(KeyCommand::Quit);
        let (mut controller, _events) = controller(
            config(1, 50, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(MemoryFormat::new()),
            surface.clone(),
        );

        assert_eq!(controller.run(), StopReason::UserRequested);
        assert_eq!(surface.presented(), 6);
        assert_eq!(controller.session().buffer().len(), 6);
    }

    #[test]
    fn test_surface_closed_stops_loop() {
        let surface = ScriptedSurface::new().idle(3).close_at_end();
        let (mut controller, _events) = controller(
            config(1, 50, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(MemoryFormat::new()),
            surface,
        );

        assert_eq!(controller.run(), StopReason::SurfaceClosed);
        assert_eq!(controller.stats().frames_captured, 4);
    }

    #[test]
    fn test_state_changes_are_reported() {
        let surface = ScriptedSurface::new().idle(9).key(KeyCommand::Clip);
        let (mut controller, events) = controller(
            config(1, 10, "."),
            pattern(),
            Arc::new(JpegCodec::new()),
            Arc::new(MemoryFormat::new()),
            surface,
        );

        for _ in 0..10 {
            controller.tick();
        }
        tick_until_capturing(&mut controller);

        let transitions: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                ReplayEvent::StateChanged { previous, current } => Some((previous, current)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (ControllerState::Capturing, ControllerState::Saving),
                (ControllerState::Saving, ControllerState::Capturing),
            ]
        );
    }
}
