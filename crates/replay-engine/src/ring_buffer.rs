//! Bounded FIFO of compressed frames.

use std::collections::VecDeque;

use parking_lot::Mutex;
use replay_codec::EncodedFrame;

/// Fixed-capacity, oldest-first-evicting buffer of compressed frames.
///
/// `append` and `snapshot` may be called from different threads. The lock is
/// held only to push/pop or to clone frame handles; frame payloads are
/// reference-counted and never copied under the lock.
pub struct RingBuffer {
    frames: Mutex<VecDeque<EncodedFrame>>,
    capacity: usize,
}

impl RingBuffer {
    /// Create an empty buffer holding at most `capacity` frames.
    ///
    /// Storage grows as frames arrive; nothing is reserved up front.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Insert a frame, evicting and returning the oldest one if the buffer is full.
    pub fn append(&self, frame: EncodedFrame) -> Option<EncodedFrame> {
        if self.capacity == 0 {
            return Some(frame);
        }

        let mut frames = self.frames.lock();
        let evicted = if frames.len() >= self.capacity {
            frames.pop_front()
        } else {
            None
        };
        frames.push_back(frame);
        evicted
    }

    /// Ordered, independently owned copy of the frames currently held.
    pub fn snapshot(&self) -> Snapshot {
        let frames: Vec<EncodedFrame> = self.frames.lock().iter().cloned().collect();
        Snapshot { frames }
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the buffer holds a full window.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total compressed bytes currently held.
    pub fn payload_bytes(&self) -> usize {
        self.frames.lock().iter().map(EncodedFrame::len).sum()
    }
}

/// Frames taken from a [`RingBuffer`] at one point in time, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    frames: Vec<EncodedFrame>,
}

impl Snapshot {
    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EncodedFrame> {
        self.frames.iter()
    }
}

impl From<Vec<EncodedFrame>> for Snapshot {
    fn from(frames: Vec<EncodedFrame>) -> Self {
        Self { frames }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a EncodedFrame;
    type IntoIter = std::slice::Iter<'a, EncodedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
