//! Seconds/microseconds time values.
//!
//! Timestamps and periods are kept as a `(sec, usec)` pair with microseconds
//! normalised into `[0, USEC_PER_SEC)`. The all-zero value is used as the
//! "no value" sentinel throughout the measurement engine.

use std::fmt;

/// Microseconds per second.
pub const USEC_PER_SEC: i64 = 1_000_000;

/// A timestamp or duration with microsecond resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeVal {
    /// Whole seconds.
    pub sec: i64,
    /// Microseconds, `0..USEC_PER_SEC` once normalised.
    pub usec: i64,
}

impl TimeVal {
    /// The "undefined" sentinel.
    pub const ZERO: TimeVal = TimeVal { sec: 0, usec: 0 };

    pub const fn new(sec: i64, usec: i64) -> Self {
        Self { sec, usec }
    }

    /// Creates a value from a microsecond count.
    pub const fn from_micros(micros: i64) -> Self {
        Self {
            sec: micros.div_euclid(USEC_PER_SEC),
            usec: micros.rem_euclid(USEC_PER_SEC),
        }
    }

    /// Returns the value as a microsecond count.
    pub const fn as_micros(&self) -> i64 {
        self.sec * USEC_PER_SEC + self.usec
    }

    /// Returns true for the zero sentinel.
    pub const fn is_zero(&self) -> bool {
        self.sec == 0 && self.usec == 0
    }

    /// Computes `self - earlier`.
    ///
    /// Microseconds are borrowed from (or carried into) the seconds of
    /// `earlier` before subtracting, so both inputs may be unnormalised.
    /// Returns `None` when the difference is negative.
    pub fn checked_sub(self, earlier: TimeVal) -> Option<TimeVal> {
        let mut y = earlier;

        if self.usec < y.usec {
            let nsec = (y.usec - self.usec) / USEC_PER_SEC + 1;
            y.usec -= USEC_PER_SEC * nsec;
            y.sec += nsec;
        }

        if self.usec - y.usec >= USEC_PER_SEC {
            let nsec = (self.usec - y.usec) / USEC_PER_SEC;
            y.usec += USEC_PER_SEC * nsec;
            y.sec -= nsec;
        }

        if self.sec < y.sec {
            return None;
        }

        Some(TimeVal {
            sec: self.sec - y.sec,
            usec: self.usec - y.usec,
        })
    }

    /// Returns `(self + other) / 2`.
    ///
    /// The halving shifts seconds and microseconds separately; an odd second
    /// contributes half a second (500 000 µs) to the microseconds before the
    /// seconds are shifted.
    pub fn half_sum(self, other: TimeVal) -> TimeVal {
        let mut sum = TimeVal {
            sec: self.sec + other.sec,
            usec: self.usec + other.usec,
        }
        .normalized();

        sum.usec >>= 1;
        if sum.sec & 1 != 0 {
            sum.usec += USEC_PER_SEC / 2;
        }
        sum.sec >>= 1;

        sum.normalized()
    }

    /// Carries whole seconds out of the microseconds field.
    fn normalized(self) -> TimeVal {
        if self.usec >= USEC_PER_SEC {
            TimeVal {
                sec: self.sec + self.usec / USEC_PER_SEC,
                usec: self.usec % USEC_PER_SEC,
            }
        } else {
            self
        }
    }
}

/// Attribute text form: seconds immediately followed by microseconds, or
/// `0` for the sentinel.
impl fmt::Display for TimeVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "0")
        } else {
            write!(f, "{}{}", self.sec, self.usec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_within_second() {
        let d = TimeVal::new(10, 500_000).checked_sub(TimeVal::new(10, 0));
        assert_eq!(d, Some(TimeVal::new(0, 500_000)));
    }

    #[test]
    fn test_sub_borrows_across_second() {
        let d = TimeVal::new(11, 0).checked_sub(TimeVal::new(10, 500_000));
        assert_eq!(d, Some(TimeVal::new(0, 500_000)));

        let d = TimeVal::new(12, 250_000).checked_sub(TimeVal::new(10, 750_000));
        assert_eq!(d, Some(TimeVal::new(1, 500_000)));
    }

    #[test]
    fn test_sub_unnormalised_input() {
        let d = TimeVal::new(10, 2_500_000).checked_sub(TimeVal::new(10, 0));
        assert_eq!(d, Some(TimeVal::new(2, 500_000)));
    }

    #[test]
    fn test_sub_negative_is_none() {
        assert_eq!(TimeVal::new(10, 0).checked_sub(TimeVal::new(10, 500_000)), None);
        assert_eq!(TimeVal::new(9, 999_999).checked_sub(TimeVal::new(10, 0)), None);
    }

    #[test]
    fn test_sub_equal_is_zero() {
        let t = TimeVal::new(42, 17);
        assert_eq!(t.checked_sub(t), Some(TimeVal::ZERO));
    }

    #[test]
    fn test_half_sum() {
        assert_eq!(TimeVal::new(1, 0).half_sum(TimeVal::new(1, 0)), TimeVal::new(1, 0));
        assert_eq!(
            TimeVal::new(0, 500_000).half_sum(TimeVal::new(1, 0)),
            TimeVal::new(0, 750_000)
        );
        assert_eq!(
            TimeVal::new(2, 600_000).half_sum(TimeVal::new(0, 600_000)),
            TimeVal::new(1, 600_000)
        );
    }

    #[test]
    fn test_half_sum_odd_seconds_with_carry() {
        // 0.9 s + 2.2 s = 3.1 s, halved = 1.55 s
        assert_eq!(
            TimeVal::new(0, 900_000).half_sum(TimeVal::new(2, 200_000)),
            TimeVal::new(1, 550_000)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TimeVal::ZERO.to_string(), "0");
        assert_eq!(TimeVal::new(0, 500_000).to_string(), "0500000");
        assert_eq!(TimeVal::new(3, 25).to_string(), "325");
    }

    #[test]
    fn test_micros_conversion() {
        assert_eq!(TimeVal::from_micros(1_500_000), TimeVal::new(1, 500_000));
        assert_eq!(TimeVal::new(2, 5).as_micros(), 2_000_005);
    }
}
