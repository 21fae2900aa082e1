//! Time source shared by the store and the rule framework.
//!
//! Everything that needs "now" asks a [`Clock`] instead of calling
//! `Utc::now()` directly, so a whole agent can be replayed against a
//! [`ManualClock`] with exact millisecond control.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Wall-clock instant used for change timestamps and rule timers.
pub type Timestamp = DateTime<Utc>;

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the Unix epoch, wrapped for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new(Timestamp::default()))
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        let mut now = self.now.lock();
        *now += Duration::milliseconds(ms);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: Timestamp) {
        *self.now.lock() = instant;
    }

    /// Milliseconds elapsed since the Unix epoch.
    pub fn epoch_ms(&self) -> i64 {
        self.now.lock().timestamp_millis()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// The default clock used when none is injected.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
