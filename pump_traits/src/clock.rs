//! Time source for every delay the controller spends.
//!
//! The loop never calls `thread::sleep` directly. Hardware runs use
//! [`MonotonicClock`]; tests and the simulator use [`ManualClock`], which
//! only moves when slept on.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;

    /// Block for `d`, or pretend to.
    fn sleep(&self, d: Duration);

    /// Whole milliseconds between `since` and now; 0 if `since` is ahead.
    fn elapsed_ms(&self, since: Instant) -> u64 {
        u64::try_from(self.now().saturating_duration_since(since).as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall time from `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub const fn new() -> Self {
        MonotonicClock
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

/// Virtual time. `sleep` returns immediately after moving the clock forward.
///
/// Clones share one counter, so a test can keep a handle while the
/// controller owns another and then assert on the total delay spent.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    nanos: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            start: Instant::now(),
            nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, d: Duration) {
        let step = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        // fetch_update never fails with a closure that always returns Some
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(step)));
    }

    /// Virtual time spent since construction.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
