//! Clock sources for pulse timestamps.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::time::{TimeVal, USEC_PER_SEC};

/// A wall-clock source with microsecond resolution.
///
/// Implementations may go backwards (clock adjustment or overflow); the
/// measurement engine treats a backwards step as an undefined period.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> TimeVal;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeVal {
        let now = Utc::now();
        // Leap seconds report up to 1_999_999 µs.
        let usec = i64::from(now.timestamp_subsec_micros()).min(USEC_PER_SEC - 1);
        TimeVal::new(now.timestamp(), usec)
    }
}

/// A manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<TimeVal>,
}

impl ManualClock {
    pub fn new(start: TimeVal) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Sets the current time. Moving backwards is allowed.
    pub fn set(&self, time: TimeVal) {
        *self.now.lock() = time;
    }

    /// Moves the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock();
        let micros = i64::try_from(step.as_micros()).unwrap_or(i64::MAX);
        *now = TimeVal::from_micros(now.as_micros().saturating_add(micros));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeVal {
        *self.now.lock()
    }
}
