//! Time sources for polling and warm-up delays.
//!
//! The poller never calls `std::thread::sleep` directly; it asks a [`Clock`].
//! [`SystemClock`] is real wall time, [`ManualClock`] is a shared virtual
//! timeline where sleeping simply advances the clock. The simulated media
//! page reads the same `ManualClock`, so playback progresses exactly as far
//! as the harness has waited.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source that can also block for a duration
pub trait Clock: Debug + Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block (or pretend to block) for `duration`
    fn sleep(&self, duration: Duration);

    /// Convenience: `now()` in whole milliseconds
    fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }
}

/// Real wall-clock time
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock advanced explicitly or by sleeping.
///
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current_us: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at t = 0
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at a given offset
    #[must_use]
    pub fn starting_at(start: Duration) -> Self {
        let clock = Self::new();
        clock.advance(start);
        clock
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.current_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// Move time forward by milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.current_us.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;
