//! Typed hardware identifiers.
//!
//! Interrupt lines and GPIO pins are both plain integers at the controller
//! level. Wrapping them keeps a GPIO number from being passed where an
//! interrupt number is expected, and moves the "not present" sentinels
//! (IRQ 0, negative GPIO) into `Option`.

use std::fmt;
use std::num::NonZeroU32;

/// An interrupt line number. Zero is never a valid interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqNumber(NonZeroU32);

impl IrqNumber {
    /// Creates an interrupt number, returning `None` for 0.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(IrqNumber)
    }

    /// Returns the raw interrupt number.
    pub const fn as_raw(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for IrqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GPIO pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpioPin(u32);

impl GpioPin {
    /// Creates a pin number.
    pub const fn new(raw: u32) -> Self {
        GpioPin(raw)
    }

    /// Creates a pin number from a signed value, returning `None` for
    /// negative values.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().map(GpioPin)
    }

    /// Returns the raw pin number.
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque cookie identifying the owner of a shared interrupt handler.
///
/// Controllers use it to find the handler to remove in `free_irq` when
/// several handlers share one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken(u64);

impl DeviceToken {
    pub const fn new(raw: u64) -> Self {
        DeviceToken(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}
