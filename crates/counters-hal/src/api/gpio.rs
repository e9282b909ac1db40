//! GPIO controller interface.

use crate::error::HalResult;
use crate::types::{GpioPin, IrqNumber};

/// A GPIO controller.
pub trait GpioController: Send + Sync {
    /// Returns true if `pin` exists on this controller.
    fn is_valid(&self, pin: GpioPin) -> bool;

    /// Maps `pin` to the interrupt line it raises.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot operate in interrupt mode.
    fn to_irq(&self, pin: GpioPin) -> HalResult<IrqNumber>;

    /// Reserves `pin` exclusively for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HalError::Busy`] if another owner holds the pin and
    /// [`crate::HalError::InvalidPin`] if the pin does not exist.
    fn request(&self, pin: GpioPin, owner: &str) -> HalResult<()>;

    /// Releases a reservation made with [`GpioController::request`].
    fn free(&self, pin: GpioPin);
}
