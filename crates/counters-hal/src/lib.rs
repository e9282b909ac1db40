//! Hardware collaborators for pulse counter drivers.
//!
//! Counter drivers never talk to an interrupt or GPIO controller directly.
//! They go through the traits in this crate, which keeps the measurement
//! core independent of the platform:
//!
//! - [`types`]: Typed interrupt, GPIO and handler-token identifiers
//! - [`error`]: errno-style status codes and the [`HalError`] type
//! - [`api`]: The [`IrqController`] and [`GpioController`] traits
//! - [`sim`]: In-memory controllers used by tests and the simulated daemon
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use counters_hal::{
//!     DeviceToken, IrqController, IrqFlags, IrqHandler, IrqNumber, IrqReturn, SimIrqChip,
//! };
//!
//! let chip = SimIrqChip::new();
//! let irq = IrqNumber::new(17).unwrap();
//! let handler: IrqHandler = Arc::new(|_irq| IrqReturn::Handled);
//!
//! chip.request_irq(irq, IrqFlags::SHARED, "counter-a", DeviceToken::new(1), handler)
//!     .unwrap();
//! assert_eq!(chip.fire(irq), 1);
//! ```

pub mod api;
pub mod error;
pub mod sim;
pub mod types;

pub use api::{GpioController, IrqController, IrqFlags, IrqHandler, IrqReturn};
pub use error::{HalError, HalResult, HalStatus};
pub use sim::{SimGpioChip, SimIrqChip};
pub use types::{DeviceToken, GpioPin, IrqNumber};
