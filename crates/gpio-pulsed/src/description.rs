//! Hardware description of GPIO pulse sources.
//!
//! A [`DeviceTree`] is the parent node that binds to this driver; each
//! child [`DeviceNode`] describes one pulse source by its GPIO and/or
//! interrupt specifiers.
//!
//! ```yaml
//! compatible: gpio-pulse-counter
//! children:
//!   - name: water-meter
//!     gpios: [4]
//!   - name: anemometer
//!     interrupts: [41]
//! ```

use serde::{Deserialize, Serialize};

use counters_hal::{GpioPin, IrqNumber};

/// Compatible string this driver binds to.
pub const COMPATIBLE: &str = "gpio-pulse-counter";

/// The parent node of all pulse sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTree {
    pub compatible: String,
    #[serde(default)]
    pub children: Vec<DeviceNode>,
}

impl DeviceTree {
    /// Creates a description compatible with this driver.
    pub fn new() -> Self {
        Self {
            compatible: COMPATIBLE.to_string(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, node: DeviceNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn is_compatible(&self) -> bool {
        self.compatible == COMPATIBLE
    }
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

/// One pulse source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNode {
    /// Node name, used as device name and interrupt label.
    pub name: String,

    /// GPIO specifiers. Negative entries mark an unresolvable GPIO.
    #[serde(default)]
    pub gpios: Vec<i64>,

    /// Interrupt specifiers. Zero means "not mapped".
    #[serde(default)]
    pub interrupts: Vec<u32>,
}

impl DeviceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gpios: Vec::new(),
            interrupts: Vec::new(),
        }
    }

    pub fn with_gpio(mut self, gpio: i64) -> Self {
        self.gpios.push(gpio);
        self
    }

    pub fn with_interrupt(mut self, irq: u32) -> Self {
        self.interrupts.push(irq);
        self
    }

    /// Resolves the GPIO at `index`.
    pub fn gpio(&self, index: usize) -> Option<GpioPin> {
        self.gpios.get(index).copied().and_then(GpioPin::from_raw)
    }

    /// Resolves the interrupt at `index`.
    pub fn irq(&self, index: usize) -> Option<IrqNumber> {
        self.interrupts.get(index).copied().and_then(IrqNumber::new)
    }
}
