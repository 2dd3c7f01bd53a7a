//! Time sources for the control core.
//!
//! Every component that measures time (timers, sensor caches, integrators,
//! the I2C completion timestamp, the cycle runner) takes an injected
//! [`SharedClock`] instead of reading a global time source. Production code
//! uses [`MonotonicClock`]; tests and the simulator use [`SimClock`] and
//! advance it explicitly, which makes every timing path deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source.
///
/// `now()` returns the time elapsed since an arbitrary, fixed origin. It must
/// never go backwards.
pub trait Clock: Send + Sync {
    /// Current time since the clock origin.
    fn now(&self) -> Duration;
}

/// Shared, type-erased clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock backed time source (origin = construction time).
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Convenience constructor returning a [`SharedClock`].
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock.
///
/// Cloning yields a handle onto the same time value, so a test can keep one
/// handle and give the other to the component under test.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    nanos: Arc<AtomicU64>,
}

impl SimClock {
    /// Create a clock at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `dt`.
    pub fn advance(&self, dt: Duration) {
        self.nanos
            .fetch_add(dt.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, t: Duration) {
        self.nanos
            .fetch_max(t.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Type-erased handle onto this clock.
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
