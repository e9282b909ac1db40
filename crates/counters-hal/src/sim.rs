//! In-memory interrupt and GPIO controllers.
//!
//! These controllers back the test suites and the daemon's simulation mode.
//! They enforce the same rules a real platform does (exclusive GPIO
//! reservations, shared-line agreement between handlers) and allow faults
//! to be injected per line or per pin.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::api::{GpioController, IrqController, IrqFlags, IrqHandler, IrqReturn};
use crate::error::{HalError, HalResult, HalStatus};
use crate::types::{DeviceToken, GpioPin, IrqNumber};

/// One handler attached to a simulated line.
struct IrqAction {
    token: DeviceToken,
    label: String,
    flags: IrqFlags,
    handler: IrqHandler,
}

/// Simulated interrupt controller.
#[derive(Default)]
pub struct SimIrqChip {
    lines: Mutex<BTreeMap<IrqNumber, Vec<IrqAction>>>,
    faults: Mutex<HashMap<IrqNumber, HalStatus>>,
}

impl SimIrqChip {
    /// Creates a controller with no handlers attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `request_irq` on `irq` fail with `status`.
    pub fn fail_request_irq(&self, irq: IrqNumber, status: HalStatus) {
        self.faults.lock().insert(irq, status);
    }

    /// Raises `irq`, invoking every handler on the line.
    ///
    /// Returns the number of handlers that reported [`IrqReturn::Handled`].
    /// Handlers run without the controller lock held.
    pub fn fire(&self, irq: IrqNumber) -> usize {
        let handlers: Vec<IrqHandler> = self
            .lines
            .lock()
            .get(&irq)
            .map(|actions| actions.iter().map(|a| a.handler.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("spurious interrupt on IRQ {}", irq);
        }

        handlers
            .iter()
            .filter(|handler| handler(irq) == IrqReturn::Handled)
            .count()
    }

    /// Raises every line that has at least one handler.
    pub fn fire_all(&self) -> usize {
        self.active_lines()
            .into_iter()
            .map(|irq| self.fire(irq))
            .sum()
    }

    /// Returns the lines with at least one handler attached.
    pub fn active_lines(&self) -> Vec<IrqNumber> {
        self.lines.lock().keys().copied().collect()
    }

    /// Returns the number of handlers attached to `irq`.
    pub fn handler_count(&self, irq: IrqNumber) -> usize {
        self.lines.lock().get(&irq).map_or(0, Vec::len)
    }

    /// Returns the labels of the handlers attached to `irq`.
    pub fn labels(&self, irq: IrqNumber) -> Vec<String> {
        self.lines
            .lock()
            .get(&irq)
            .map(|actions| actions.iter().map(|a| a.label.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the total number of attached handlers across all lines.
    pub fn total_handlers(&self) -> usize {
        self.lines.lock().values().map(Vec::len).sum()
    }
}

impl IrqController for SimIrqChip {
    fn request_irq(
        &self,
        irq: IrqNumber,
        flags: IrqFlags,
        label: &str,
        token: DeviceToken,
        handler: IrqHandler,
    ) -> HalResult<()> {
        if let Some(status) = self.faults.lock().get(&irq).copied() {
            warn!("IRQ {} request by {} failed: {}", irq, label, status);
            return Err(HalError::from_status(status));
        }

        let mut lines = self.lines.lock();
        let actions = lines.entry(irq).or_default();

        if let Some(existing) = actions.first() {
            let shared = existing.flags.contains(IrqFlags::SHARED) && flags.contains(IrqFlags::SHARED);
            if !shared {
                return Err(HalError::busy(format!("IRQ {}", irq), existing.label.clone()));
            }
        }

        if actions.iter().any(|a| a.token == token) {
            return Err(HalError::invalid_argument(format!(
                "token {} already attached to IRQ {}",
                token, irq
            )));
        }

        actions.push(IrqAction {
            token,
            label: label.to_string(),
            flags,
            handler,
        });
        debug!("IRQ {} attached for {} ({:?})", irq, label, flags);

        Ok(())
    }

    fn free_irq(&self, irq: IrqNumber, token: DeviceToken) {
        let mut lines = self.lines.lock();

        if let Some(actions) = lines.get_mut(&irq) {
            actions.retain(|a| a.token != token);
            if actions.is_empty() {
                lines.remove(&irq);
            }
            debug!("IRQ {} freed for token {}", irq, token);
        } else {
            warn!("free_irq on IRQ {} with no handlers", irq);
        }
    }
}

/// Simulated GPIO controller with pins `0..ngpio`.
pub struct SimGpioChip {
    ngpio: u32,
    irq_base: Option<u32>,
    owners: Mutex<HashMap<GpioPin, String>>,
    request_faults: Mutex<HashMap<GpioPin, HalStatus>>,
    to_irq_faults: Mutex<HashMap<GpioPin, HalStatus>>,
}

impl SimGpioChip {
    /// Creates a controller with `ngpio` pins.
    ///
    /// When `irq_base` is set, pin `n` raises interrupt `irq_base + n`;
    /// otherwise no pin supports interrupt mode.
    pub fn new(ngpio: u32, irq_base: Option<u32>) -> Self {
        Self {
            ngpio,
            irq_base,
            owners: Mutex::new(HashMap::new()),
            request_faults: Mutex::new(HashMap::new()),
            to_irq_faults: Mutex::new(HashMap::new()),
        }
    }

    /// Makes every later `request` of `pin` fail with `status`.
    pub fn fail_request_gpio(&self, pin: GpioPin, status: HalStatus) {
        self.request_faults.lock().insert(pin, status);
    }

    /// Makes every later `to_irq` of `pin` fail with `status`.
    pub fn fail_to_irq(&self, pin: GpioPin, status: HalStatus) {
        self.to_irq_faults.lock().insert(pin, status);
    }

    /// Returns true if `pin` is currently reserved.
    pub fn is_requested(&self, pin: GpioPin) -> bool {
        self.owners.lock().contains_key(&pin)
    }

    /// Returns the owner label of a reserved pin.
    pub fn owner(&self, pin: GpioPin) -> Option<String> {
        self.owners.lock().get(&pin).cloned()
    }

    /// Returns the number of reserved pins.
    pub fn requested_count(&self) -> usize {
        self.owners.lock().len()
    }
}

impl GpioController for SimGpioChip {
    fn is_valid(&self, pin: GpioPin) -> bool {
        pin.as_raw() < self.ngpio
    }

    fn to_irq(&self, pin: GpioPin) -> HalResult<IrqNumber> {
        if !self.is_valid(pin) {
            return Err(HalError::InvalidPin {
                pin: i64::from(pin.as_raw()),
            });
        }
        if let Some(status) = self.to_irq_faults.lock().get(&pin).copied() {
            return Err(HalError::from_status(status));
        }

        let base = self
            .irq_base
            .ok_or_else(|| HalError::not_supported(format!("GPIO {} in interrupt mode", pin)))?;

        base.checked_add(pin.as_raw())
            .and_then(IrqNumber::new)
            .ok_or_else(|| HalError::invalid_argument(format!("no IRQ mapping for GPIO {}", pin)))
    }

    fn request(&self, pin: GpioPin, owner: &str) -> HalResult<()> {
        if !self.is_valid(pin) {
            return Err(HalError::InvalidPin {
                pin: i64::from(pin.as_raw()),
            });
        }
        if let Some(status) = self.request_faults.lock().get(&pin).copied() {
            warn!("GPIO {} request by {} failed: {}", pin, owner, status);
            return Err(HalError::from_status(status));
        }

        let mut owners = self.owners.lock();
        if let Some(current) = owners.get(&pin) {
            return Err(HalError::busy(format!("GPIO {}", pin), current.clone()));
        }
        owners.insert(pin, owner.to_string());
        debug!("GPIO {} reserved by {}", pin, owner);

        Ok(())
    }

    fn free(&self, pin: GpioPin) {
        if self.owners.lock().remove(&pin).is_none() {
            warn!("free of unreserved GPIO {}", pin);
        }
    }
}
