//! Background thread that writes clips without stalling capture.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use replay_codec::VideoConfig;
use tracing::{debug, info, warn};

use crate::clip_writer::{ClipWriter, SavedClip};
use crate::error::{SaveRequestError, WriteError};
use crate::ring_buffer::Snapshot;

/// A snapshot queued for writing.
pub struct SaveJob {
    pub snapshot: Snapshot,
    pub video: VideoConfig,
}

/// Outcome of one save.
#[derive(Debug)]
pub struct SaveReport {
    /// Frames in the snapshot.
    pub frames: usize,
    pub result: Result<SavedClip, WriteError>,
}

/// Owns the clip-writer thread. At most one save is in flight.
pub struct SaveWorker {
    job_tx: Option<Sender<SaveJob>>,
    result_rx: Receiver<SaveReport>,
    handle: Option<JoinHandle<()>>,
    in_flight: bool,
    /// Report produced without reaching the thread.
    pending: Option<SaveReport>,
}

impl SaveWorker {
    /// Start the writer thread.
    pub fn spawn(writer: ClipWriter) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<SaveJob>(1);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let handle = thread::spawn(move || worker_loop(writer, job_rx, result_tx));

        Self {
            job_tx: Some(job_tx),
            result_rx,
            handle: Some(handle),
            in_flight: false,
            pending: None,
        }
    }

    /// True while a submitted save has not been reported back.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Hand a snapshot to the writer thread.
    pub fn submit(&mut self, job: SaveJob) -> Result<(), SaveRequestError> {
        if self.in_flight {
            return Err(SaveRequestError::Busy);
        }

        let job_tx = self.job_tx.as_ref().ok_or(SaveRequestError::Busy)?;
        match job_tx.try_send(job) {
            Ok(()) => {
                self.in_flight = true;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SaveRequestError::Busy),
            Err(TrySendError::Disconnected(job)) => {
                warn!("Save worker thread is gone");
                self.in_flight = true;
                self.pending = Some(SaveReport {
                    frames: job.snapshot.len(),
                    result: Err(WriteError::WorkerGone),
                });
                Ok(())
            }
        }
    }

    /// Non-blocking check for a finished save.
    pub fn poll(&mut self) -> Option<SaveReport> {
        if let Some(report) = self.pending.take() {
            self.in_flight = false;
            return Some(report);
        }

        match self.result_rx.try_recv() {
            Ok(report) => {
                self.in_flight = false;
                Some(report)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if self.in_flight {
                    self.in_flight = false;
                    return Some(SaveReport {
                        frames: 0,
                        result: Err(WriteError::WorkerGone),
                    });
                }
                None
            }
        }
    }

    /// Block up to `timeout` for a finished save.
    pub fn wait(&mut self, timeout: Duration) -> Option<SaveReport> {
        if !self.in_flight {
            return None;
        }
        if let Some(report) = self.pending.take() {
            self.in_flight = false;
            return Some(report);
        }

        match self.result_rx.recv_timeout(timeout) {
            Ok(report) => {
                self.in_flight = false;
                Some(report)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = false;
                Some(SaveReport {
                    frames: 0,
                    result: Err(WriteError::WorkerGone),
                })
            }
        }
    }

    /// Stop accepting jobs and join the thread. An in-flight save runs to completion.
    pub fn shutdown(&mut self) -> Option<SaveReport> {
        drop(self.job_tx.take());

        if let Some(handle) = self.handle.take() {
            if self.in_flight {
                info!("Waiting for in-flight clip save to finish");
            }
            if handle.join().is_err() {
                warn!("Save worker thread panicked");
            }
        }

        self.poll()
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn worker_loop(writer: ClipWriter, job_rx: Receiver<SaveJob>, result_tx: Sender<SaveReport>) {
    debug!(output_dir = %writer.output_dir().display(), "Save worker started");

    for job in job_rx.iter() {
        let frames = job.snapshot.len();
        let result = writer.save(&job.snapshot, &job.video);
        if result_tx.send(SaveReport { frames, result }).is_err() {
            break;
        }
    }

    debug!("Save worker stopped");
}
