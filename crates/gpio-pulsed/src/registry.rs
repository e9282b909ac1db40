//! Pulse source registry.
//!
//! The registry walks a [`DeviceTree`] and turns every usable child node
//! into a counter device whose interrupt handler records a pulse. Each
//! successfully bound node is kept as a [`PulseSourceEntry`]; teardown walks
//! that list, never the description, so a node that failed halfway is never
//! touched twice.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use counters_class::{CounterClass, DeviceId};
use counters_hal::{
    DeviceToken, GpioController, GpioPin, IrqController, IrqFlags, IrqHandler, IrqNumber,
    IrqReturn,
};

use crate::description::{DeviceNode, DeviceTree, COMPATIBLE};
use crate::error::{RegistryError, RegistryResult};

/// Driver payload of a GPIO pulse counter. `None` means not bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpioPulseCounter {
    pub irq: Option<IrqNumber>,
    pub gpio: Option<GpioPin>,
}

/// The class type used by this driver.
pub type PulseCounterClass = CounterClass<GpioPulseCounter>;

/// A bound pulse source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseSourceEntry {
    pub id: DeviceId,
    /// Node name.
    pub name: String,
}

/// Handler cookie for `id` on a shared line.
pub fn device_token(id: DeviceId) -> DeviceToken {
    DeviceToken::new(id.as_u64())
}

/// Releases the hardware bound to a device. Safe to call repeatedly.
pub fn shutdown_device(
    irq_ctl: &dyn IrqController,
    gpio_ctl: &dyn GpioController,
    id: DeviceId,
    payload: &mut GpioPulseCounter,
) {
    if let Some(irq) = payload.irq.take() {
        irq_ctl.free_irq(irq, device_token(id));
    }
    if let Some(pin) = payload.gpio.take() {
        gpio_ctl.free(pin);
    }
}

/// Interrupt handler for one device on a possibly shared line.
///
/// Claims the interrupt only while the device is alive.
pub fn pulse_handler(class: Weak<PulseCounterClass>, id: DeviceId) -> IrqHandler {
    Arc::new(move |_irq| match class.upgrade() {
        Some(class) if class.record_pulse(id).is_ok() => IrqReturn::Handled,
        _ => IrqReturn::None,
    })
}

/// Binds described pulse sources to counter devices.
pub struct PulseCounterRegistry {
    class: Arc<PulseCounterClass>,
    irq: Arc<dyn IrqController>,
    gpio: Arc<dyn GpioController>,
    /// `None` until probed.
    entries: Mutex<Option<Vec<PulseSourceEntry>>>,
}

impl PulseCounterRegistry {
    pub fn new(
        class: Arc<PulseCounterClass>,
        irq: Arc<dyn IrqController>,
        gpio: Arc<dyn GpioController>,
    ) -> Self {
        Self {
            class,
            irq,
            gpio,
            entries: Mutex::new(None),
        }
    }

    pub fn class(&self) -> &Arc<PulseCounterClass> {
        &self.class
    }

    /// Binds every usable child of `tree`.
    ///
    /// Returns the number of devices bound. A failing node is rolled back
    /// and skipped. The whole call fails only on a second probe (checked
    /// first), a missing or incompatible description, or failure to reserve
    /// the entry list.
    #[instrument(skip(self, tree))]
    pub fn probe(&self, tree: Option<&DeviceTree>) -> RegistryResult<usize> {
        let mut entries = self.entries.lock();
        if entries.is_some() {
            return Err(RegistryError::Busy {
                reason: "pulse sources already bound".to_string(),
            });
        }

        let tree = tree.ok_or_else(|| RegistryError::unsupported("no hardware description"))?;
        if !tree.is_compatible() {
            return Err(RegistryError::unsupported(format!(
                "'{}' is not compatible with '{}'",
                tree.compatible, COMPATIBLE
            )));
        }

        let mut bound = Vec::new();
        bound
            .try_reserve(tree.children.len())
            .map_err(|_| RegistryError::AllocationFailure {
                what: "pulse source list".to_string(),
            })?;

        for node in &tree.children {
            match self.probe_node(node) {
                Ok(entry) => bound.push(entry),
                Err(RegistryError::NoInterrupt { node }) => {
                    warn!("Skipping '{}': no interrupt", node);
                }
                Err(err) => {
                    error!("Failed to bind '{}': {} ({})", node.name, err, err.errno());
                }
            }
        }

        let count = bound.len();
        *entries = Some(bound);
        info!(
            "Bound {} of {} pulse sources",
            count,
            tree.children.len()
        );
        Ok(count)
    }

    fn probe_node(&self, node: &DeviceNode) -> RegistryResult<PulseSourceEntry> {
        let gpio = node.gpio(0).filter(|pin| self.gpio.is_valid(*pin));
        let irq = match (node.irq(0), gpio) {
            (Some(irq), _) => irq,
            (None, Some(pin)) => self.gpio.to_irq(pin)?,
            (None, None) => {
                return Err(RegistryError::NoInterrupt {
                    node: node.name.clone(),
                })
            }
        };

        let id = self.build_device(&node.name, irq, gpio)?;
        Ok(PulseSourceEntry {
            id,
            name: node.name.clone(),
        })
    }

    /// Creates and binds one device.
    ///
    /// Any failure after allocation unregisters the device, which releases
    /// it and runs `shutdown_device` on whatever was bound so far.
    #[instrument(skip(self))]
    pub fn build_device(
        &self,
        name: &str,
        irq: IrqNumber,
        gpio: Option<GpioPin>,
    ) -> RegistryResult<DeviceId> {
        let id = self.class.allocate(name, GpioPulseCounter::default())?;

        if let Err(err) = self.bind(id, name, irq, gpio) {
            if let Err(cleanup) = self.class.unregister(id) {
                error!("Rollback of '{}' failed: {}", name, cleanup);
            }
            return Err(err);
        }

        info!("'{}' bound to IRQ {} as {}", name, irq, id);
        Ok(id)
    }

    fn bind(
        &self,
        id: DeviceId,
        name: &str,
        irq: IrqNumber,
        gpio: Option<GpioPin>,
    ) -> RegistryResult<()> {
        self.class.register(id)?;

        if let Some(pin) = gpio {
            self.gpio.request(pin, name)?;
        }

        let irq_ctl = self.irq.clone();
        let gpio_ctl = self.gpio.clone();
        self.class.set_shutdown(id, move |id, payload: &mut GpioPulseCounter| {
            shutdown_device(irq_ctl.as_ref(), gpio_ctl.as_ref(), id, payload)
        })?;
        self.class.with_payload(id, |payload| payload.gpio = gpio)?;

        let handler = pulse_handler(Arc::downgrade(&self.class), id);
        self.irq
            .request_irq(irq, IrqFlags::SHARED, name, device_token(id), handler)?;
        self.class.with_payload(id, |payload| payload.irq = Some(irq))?;

        Ok(())
    }

    /// Unregisters every bound device. Errors are logged.
    #[instrument(skip(self))]
    pub fn remove(&self) {
        let mut entries = self.entries.lock();
        let Some(bound) = entries.take() else {
            return;
        };

        let count = bound.len();
        for entry in bound {
            match self.class.unregister(entry.id) {
                Ok(()) => debug!("Removed '{}'", entry.name),
                Err(err) => error!("Failed to remove '{}': {}", entry.name, err),
            }
        }
        info!("Removed {} pulse sources", count);
    }

    /// Bound entries in probe order.
    pub fn devices(&self) -> Vec<PulseSourceEntry> {
        self.entries.lock().clone().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_probed(&self) -> bool {
        self.entries.lock().is_some()
    }
}

impl Drop for PulseCounterRegistry {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use counters_class::ClassConfig;
    use counters_hal::{HalStatus, SimGpioChip, SimIrqChip};

    use super::*;

    struct Fixture {
        irq: Arc<SimIrqChip>,
        gpio: Arc<SimGpioChip>,
        registry: PulseCounterRegistry,
    }

    fn fixture() -> Fixture {
        let irq = Arc::new(SimIrqChip::new());
        let gpio = Arc::new(SimGpioChip::new(16, Some(100)));
        let class = Arc::new(PulseCounterClass::new(ClassConfig::default()));
        let registry = PulseCounterRegistry::new(class, irq.clone(), gpio.clone());
        Fixture {
            irq,
            gpio,
            registry,
        }
    }

    fn irq(n: u32) -> IrqNumber {
        IrqNumber::new(n).unwrap()
    }

    #[test]
    fn test_probe_without_description() {
        let f = fixture();
        let err = f.registry.probe(None).unwrap_err();
        assert!(matches!(err, RegistryError::ConfigurationUnsupported { .. }));
        assert!(!f.registry.is_probed());
        assert!(f.registry.class().is_idle());
    }

    #[test]
    fn test_probe_incompatible() {
        let f = fixture();
        let mut tree = DeviceTree::new().with_child(DeviceNode::new("a").with_interrupt(5));
        tree.compatible = "gpio-keys".to_string();
        assert!(f.registry.probe(Some(&tree)).is_err());
        assert!(f.registry.class().is_idle());
    }

    #[test]
    fn test_probe_binds_interrupt_and_gpio() {
        let f = fixture();
        let tree = DeviceTree::new()
            .with_child(DeviceNode::new("direct").with_interrupt(7))
            .with_child(DeviceNode::new("via-gpio").with_gpio(3));

        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 2);
        assert_eq!(f.irq.labels(irq(7)), vec!["direct"]);
        assert_eq!(f.irq.labels(irq(103)), vec!["via-gpio"]);
        assert_eq!(f.gpio.owner(GpioPin::new(3)).as_deref(), Some("via-gpio"));

        let names: Vec<_> = f.registry.devices().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["direct", "via-gpio"]);

        let id = f.registry.devices()[1].id;
        let payload = f.registry.class().with_payload(id, |p| *p).unwrap();
        assert_eq!(
            payload,
            GpioPulseCounter {
                irq: Some(irq(103)),
                gpio: Some(GpioPin::new(3)),
            }
        );
    }

    #[test]
    fn test_interrupt_counts_pulses() {
        let f = fixture();
        let tree = DeviceTree::new().with_child(DeviceNode::new("meter").with_interrupt(9));
        f.registry.probe(Some(&tree)).unwrap();
        let id = f.registry.devices()[0].id;

        assert_eq!(f.irq.fire(irq(9)), 1);
        assert_eq!(f.irq.fire(irq(9)), 1);
        assert_eq!(f.registry.class().snapshot_count(id).unwrap(), 2);
    }

    #[test]
    fn test_node_without_interrupt_is_skipped() {
        let f = fixture();
        let tree = DeviceTree::new()
            .with_child(DeviceNode::new("nothing"))
            .with_child(DeviceNode::new("bad-gpio").with_gpio(-1))
            .with_child(DeviceNode::new("ok").with_interrupt(4));

        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 1);
        assert_eq!(f.registry.class().device_count(), 1);
    }

    #[test]
    fn test_gpio_to_irq_failure_isolated() {
        let f = fixture();
        f.gpio.fail_to_irq(GpioPin::new(2), HalStatus::InvalidArgument);
        let tree = DeviceTree::new()
            .with_child(DeviceNode::new("a").with_gpio(1))
            .with_child(DeviceNode::new("b").with_gpio(2))
            .with_child(DeviceNode::new("c").with_gpio(3));

        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 2);
        assert!(!f.gpio.is_requested(GpioPin::new(2)));
        assert_eq!(f.gpio.requested_count(), 2);
    }

    #[test]
    fn test_gpio_busy_rolls_back_device() {
        let f = fixture();
        f.gpio.request(GpioPin::new(5), "someone-else").unwrap();
        let tree = DeviceTree::new().with_child(DeviceNode::new("a").with_gpio(5));

        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 0);
        assert!(f.registry.class().is_idle());
        assert_eq!(f.gpio.owner(GpioPin::new(5)).as_deref(), Some("someone-else"));
    }

    #[test]
    fn test_irq_failure_releases_gpio() {
        let f = fixture();
        f.irq.fail_request_irq(irq(105), HalStatus::Busy);
        let tree = DeviceTree::new().with_child(DeviceNode::new("a").with_gpio(5));

        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 0);
        assert!(!f.gpio.is_requested(GpioPin::new(5)));
        assert_eq!(f.irq.total_handlers(), 0);
        assert!(f.registry.class().is_idle());
    }

    #[test]
    fn test_shared_line_handlers() {
        let f = fixture();
        let tree = DeviceTree::new()
            .with_child(DeviceNode::new("a").with_interrupt(12))
            .with_child(DeviceNode::new("b").with_interrupt(12));

        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 2);
        assert_eq!(f.irq.handler_count(irq(12)), 2);
        assert_eq!(f.irq.fire(irq(12)), 2);
    }

    #[test]
    fn test_handler_for_destroyed_device_is_not_handled() {
        let f = fixture();
        let tree = DeviceTree::new().with_child(DeviceNode::new("a").with_interrupt(3));
        f.registry.probe(Some(&tree)).unwrap();
        let id = f.registry.devices()[0].id;

        let stale = pulse_handler(Arc::downgrade(f.registry.class()), id);
        assert_eq!(stale(irq(3)), IrqReturn::Handled);

        f.registry.remove();
        assert_eq!(stale(irq(3)), IrqReturn::None);
    }

    #[test]
    fn test_double_probe_is_busy() {
        let f = fixture();
        let tree = DeviceTree::new().with_child(DeviceNode::new("a").with_interrupt(3));
        f.registry.probe(Some(&tree)).unwrap();

        let err = f.registry.probe(Some(&tree)).unwrap_err();
        assert_eq!(err.errno(), -16);
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_double_probe_is_busy_whatever_the_description() {
        let f = fixture();
        let tree = DeviceTree::new().with_child(DeviceNode::new("a").with_interrupt(3));
        f.registry.probe(Some(&tree)).unwrap();

        let err = f.registry.probe(None).unwrap_err();
        assert!(matches!(err, RegistryError::Busy { .. }));

        let mut foreign = tree.clone();
        foreign.compatible = "gpio-keys".to_string();
        let err = f.registry.probe(Some(&foreign)).unwrap_err();
        assert!(matches!(err, RegistryError::Busy { .. }));
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_remove_releases_everything() {
        let f = fixture();
        let tree = DeviceTree::new()
            .with_child(DeviceNode::new("a").with_gpio(1))
            .with_child(DeviceNode::new("b").with_interrupt(50));
        f.registry.probe(Some(&tree)).unwrap();

        f.registry.remove();
        assert!(!f.registry.is_probed());
        assert!(f.registry.is_empty());
        assert_eq!(f.irq.total_handlers(), 0);
        assert_eq!(f.gpio.requested_count(), 0);
        assert!(f.registry.class().is_idle());

        // a removed registry can be probed again
        assert_eq!(f.registry.probe(Some(&tree)).unwrap(), 2);
    }

    #[test]
    fn test_shutdown_device_is_idempotent() {
        let f = fixture();
        let id = f.registry.build_device("x", irq(20), Some(GpioPin::new(6))).unwrap();
        let mut payload = f.registry.class().with_payload(id, |p| *p).unwrap();

        shutdown_device(f.irq.as_ref(), f.gpio.as_ref(), id, &mut payload);
        assert_eq!(payload, GpioPulseCounter::default());
        assert_eq!(f.irq.total_handlers(), 0);
        assert!(!f.gpio.is_requested(GpioPin::new(6)));

        shutdown_device(f.irq.as_ref(), f.gpio.as_ref(), id, &mut payload);
        assert_eq!(payload, GpioPulseCounter::default());
    }
}
