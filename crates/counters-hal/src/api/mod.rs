//! Controller interfaces used by counter drivers.
//!
//! - [`irq`]: Interrupt line requests and shared handlers
//! - [`gpio`]: GPIO validation, reservation and GPIO-to-IRQ mapping

pub mod gpio;
pub mod irq;

pub use gpio::GpioController;
pub use irq::{IrqController, IrqFlags, IrqHandler, IrqReturn};
