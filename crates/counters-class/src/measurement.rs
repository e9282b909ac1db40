//! The per-device measurement engine.
//!
//! [`Measurements`] turns a stream of pulse timestamps into a pulse count,
//! the period between the two most recent pulses, and a running average
//! period. It holds no lock of its own: every device keeps its
//! `Measurements` behind a short-held mutex, and all methods here are
//! expected to run inside that critical section.
//!
//! The running average is a fixed-weight exponential moving average:
//! every new period is averaged with the previous average, giving the
//! newest sample weight 1/2.

use crate::time::TimeVal;

/// Pulse statistics of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measurements {
    pulse_count: u64,
    last_pulse: TimeVal,
    last_pulse_period: TimeVal,
    average_pulse_period: TimeVal,
}

impl Measurements {
    /// Creates zeroed statistics (no pulse seen yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pulse observed at `now`.
    ///
    /// When `now` precedes the previous pulse (clock overflow or a
    /// backwards adjustment) the last period becomes undefined and the
    /// average keeps its previous value.
    pub fn record_pulse(&mut self, now: TimeVal) {
        self.pulse_count = self.pulse_count.wrapping_add(1);

        if !self.last_pulse.is_zero() {
            match now.checked_sub(self.last_pulse) {
                Some(period) => {
                    self.last_pulse_period = period;
                    self.average_pulse_period = if self.average_pulse_period.is_zero() {
                        period
                    } else {
                        self.average_pulse_period.half_sum(period)
                    };
                }
                // TODO: recover the real period across a clock wrap instead of discarding it
                None => self.last_pulse_period = TimeVal::ZERO,
            }
        }

        self.last_pulse = now;
    }

    /// Returns the pulse count, resetting it to zero when `clear_on_read`
    /// is set.
    pub fn snapshot_count(&mut self, clear_on_read: bool) -> u64 {
        let value = self.pulse_count;
        if clear_on_read {
            self.pulse_count = 0;
        }
        value
    }

    /// Overwrites the pulse count.
    pub fn set_count(&mut self, value: u64) {
        self.pulse_count = value;
    }

    pub fn pulse_count(&self) -> u64 {
        self.pulse_count
    }

    /// Timestamp of the most recent pulse, or the zero sentinel.
    pub fn last_pulse(&self) -> TimeVal {
        self.last_pulse
    }

    /// Period between the two most recent pulses, or the zero sentinel.
    pub fn last_pulse_period(&self) -> TimeVal {
        self.last_pulse_period
    }

    /// Running average period, or the zero sentinel.
    pub fn average_pulse_period(&self) -> TimeVal {
        self.average_pulse_period
    }

    pub fn reset_last_period(&mut self) {
        self.last_pulse_period = TimeVal::ZERO;
    }

    pub fn reset_average_period(&mut self) {
        self.average_pulse_period = TimeVal::ZERO;
    }
}
