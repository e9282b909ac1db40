//! Class-wide configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every device of a [`CounterClass`](crate::CounterClass).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassConfig {
    /// Initial value of the `clear_count_when_reading` class attribute.
    pub clear_count_when_reading: bool,

    /// Upper bound on simultaneously live devices. `None` is unbounded.
    pub max_devices: Option<usize>,
}

impl ClassConfig {
    /// Sets the initial clear-on-read flag.
    pub fn with_clear_count_when_reading(mut self, enabled: bool) -> Self {
        self.clear_count_when_reading = enabled;
        self
    }

    /// Limits the number of live devices.
    pub fn with_max_devices(mut self, max: usize) -> Self {
        self.max_devices = Some(max);
        self
    }
}
