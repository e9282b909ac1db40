//! Interrupt controller interface.

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::HalResult;
use crate::types::{DeviceToken, IrqNumber};

bitflags! {
    /// Flags passed when requesting an interrupt line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IrqFlags: u32 {
        /// The line may be shared with other handlers.
        const SHARED = 0x0000_0080;
    }
}

/// Result of an interrupt handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqReturn {
    /// The event did not belong to this handler.
    None,
    /// The handler consumed the event.
    Handled,
}

/// An interrupt handler.
///
/// Handlers run in interrupt context: they must not block and must return
/// in bounded time.
pub type IrqHandler = Arc<dyn Fn(IrqNumber) -> IrqReturn + Send + Sync>;

/// An interrupt controller.
pub trait IrqController: Send + Sync {
    /// Attaches `handler` to `irq`.
    ///
    /// `label` names the owner in diagnostics. `token` identifies this
    /// handler among others sharing the line and must be passed back to
    /// [`IrqController::free_irq`].
    ///
    /// # Errors
    ///
    /// Returns an error if the line is unavailable, already taken without
    /// [`IrqFlags::SHARED`], or the controller rejects the request.
    fn request_irq(
        &self,
        irq: IrqNumber,
        flags: IrqFlags,
        label: &str,
        token: DeviceToken,
        handler: IrqHandler,
    ) -> HalResult<()>;

    /// Detaches the handler registered on `irq` with `token`.
    ///
    /// Freeing a handler that is not registered is a no-op.
    fn free_irq(&self, irq: IrqNumber, token: DeviceToken);
}

