//! Fixed-rate tick pacing.

use std::thread;
use std::time::{Duration, Instant};

use replay_ipc::PacingMode;

/// Timing of one completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    /// Time spent on the tick's work.
    pub elapsed: Duration,

    /// Time the pacer slept afterwards.
    pub slept: Duration,

    /// True if the work alone took at least one interval.
    pub overrun: bool,
}

/// Spaces loop iterations `1/fps` apart.
///
/// In [`PacingMode::Fixed`] each tick sleeps `max(0, T - elapsed)` with no
/// carry-over between ticks, so sustained overload lowers the effective rate.
/// In [`PacingMode::Deadline`] ticks follow a monotonic schedule and a late
/// tick shortens the next sleep; after falling more than one interval behind
/// the schedule re-anchors to the current time.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    mode: PacingMode,
    next_deadline: Option<Instant>,
}

impl Pacer {
    pub fn new(fps: u32, mode: PacingMode) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / fps.max(1) as u64),
            mode,
            next_deadline: None,
        }
    }

    /// Target frame interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn mode(&self) -> PacingMode {
        self.mode
    }

    /// Budget left in the tick that began at `started`.
    pub fn remaining(&self, started: Instant) -> Duration {
        self.deadline_for(started)
            .saturating_duration_since(Instant::now())
    }

    /// End the tick that began at `started`, sleeping out the rest of its interval.
    pub fn finish(&mut self, started: Instant) -> TickTiming {
        let now = Instant::now();
        let elapsed = now.duration_since(started);
        let slept = match self.mode {
            PacingMode::Fixed => sleep_budget(self.interval, elapsed),
            PacingMode::Deadline => {
                let deadline = self.deadline_for(started);
                self.next_deadline = Some(next_deadline(deadline, now, self.interval));
                deadline.saturating_duration_since(now)
            }
        };

        if !slept.is_zero() {
            thread::sleep(slept);
        }

        TickTiming {
            elapsed,
            slept,
            overrun: elapsed >= self.interval,
        }
    }

    fn deadline_for(&self, started: Instant) -> Instant {
        match (self.mode, self.next_deadline) {
            (PacingMode::Deadline, Some(deadline)) => deadline,
            _ => started + self.interval,
        }
    }
}

/// Sleep needed after a tick of `elapsed` work in fixed mode.
pub fn sleep_budget(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Deadline after `deadline`, re-anchored to `now` if the loop is more than one interval late.
fn next_deadline(deadline: Instant, now: Instant, interval: Duration) -> Instant {
    let scheduled = deadline + interval;
    if now > scheduled {
        now + interval
    } else {
        scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_fps() {
        assert_eq!(
            Pacer::new(30, PacingMode::Fixed).interval(),
            Duration::from_nanos(33_333_333)
        );
        assert_eq!(
            Pacer::new(10, PacingMode::Fixed).interval(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_sleep_budget_never_negative() {
        let interval = Duration::from_millis(33);
        assert_eq!(
            sleep_budget(interval, Duration::from_millis(10)),
            Duration::from_millis(23)
        );
        assert_eq!(sleep_budget(interval, Duration::from_millis(33)), Duration::ZERO);
        assert_eq!(sleep_budget(interval, Duration::from_millis(80)), Duration::ZERO);
    }

    #[test]
    fn test_next_deadline_schedule() {
        let interval = Duration::from_millis(100);
        let base = Instant::now();

        // On time: schedule advances by one interval.
        let next = next_deadline(base, base + Duration::from_millis(20), interval);
        assert_eq!(next, base + interval);

        // Late but within one interval: keep the schedule.
        let next = next_deadline(base, base + Duration::from_millis(90), interval);
        assert_eq!(next, base + interval);

        // More than one interval late: re-anchor to now.
        let now = base + Duration::from_millis(250);
        assert_eq!(next_deadline(base, now, interval), now + interval);
    }

    #[test]
    fn test_fast_ticks_are_spaced_one_interval_apart() {
        let mut pacer = Pacer::new(30, PacingMode::Fixed);
        let interval = pacer.interval();
        let mut starts = Vec::new();

        for _ in 0..6 {
            let started = Instant::now();
            starts.push(started);
            thread::sleep(Duration::from_millis(5));
            let timing = pacer.finish(started);
            assert!(!timing.overrun);
            assert!(timing.slept > Duration::ZERO);
            assert_eq!(timing.slept, sleep_budget(interval, timing.elapsed));
        }

        for pair in starts.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(gap >= interval, "gap {gap:?} shorter than {interval:?}");
            assert!(
                gap < interval + Duration::from_millis(15),
                "gap {gap:?} too long"
            );
        }
    }

    #[test]
    fn test_slow_tick_does_not_sleep() {
        let mut pacer = Pacer::new(30, PacingMode::Fixed);
        let started = Instant::now();
        thread::sleep(Duration::from_millis(45));

        let before = Instant::now();
        let timing = pacer.finish(started);
        assert!(timing.overrun);
        assert_eq!(timing.slept, Duration::ZERO);
        assert!(before.elapsed() < Duration::from_millis(5));
        assert_eq!(pacer.remaining(started), Duration::ZERO);
    }

    #[test]
    fn test_deadline_mode_shortens_sleep_after_late_tick() {
        let mut pacer = Pacer::new(20, PacingMode::Deadline);
        let interval = pacer.interval();

        // First tick overruns by less than an interval.
        let first = Instant::now();
        thread::sleep(interval + Duration::from_millis(10));
        let timing = pacer.finish(first);
        assert!(timing.overrun);

        // Second tick is fast; it only sleeps up to the original schedule.
        let second = Instant::now();
        let timing = pacer.finish(second);
        assert!(timing.slept < interval);
        assert!(Instant::now() >= first + interval * 2);
    }
}
