//! Test fixtures for pulse counter scenarios

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use counters_class::{
    AttributeError, AttributePublisher, AttributeTree, ClassConfig, DeviceId, ManualClock,
    PublishedDevice, TimeVal,
};
use counters_hal::{GpioPin, IrqNumber, SimGpioChip, SimIrqChip};
use gpio_pulsed::{PulseCounterClass, PulseCounterRegistry};

/// Number of GPIO lines on the bench's simulated chip.
pub const BENCH_GPIO_LINES: u32 = 16;

/// Interrupt number of GPIO 0 on the bench's simulated chip.
pub const BENCH_IRQ_BASE: u32 = 200;

/// Start time of the bench clock.
pub const BENCH_EPOCH: TimeVal = TimeVal::new(1_000, 0);

/// Shorthand for a known-valid interrupt number.
pub fn irq(n: u32) -> IrqNumber {
    IrqNumber::new(n).unwrap_or_else(|| panic!("IRQ {n} is not valid"))
}

/// Shorthand for a GPIO pin.
pub fn pin(n: u32) -> GpioPin {
    GpioPin::new(n)
}

/// Interrupt a bench GPIO maps to.
pub fn gpio_irq(n: u32) -> IrqNumber {
    irq(BENCH_IRQ_BASE + n)
}

/// Attribute tree that refuses to publish chosen resource names.
#[derive(Default)]
pub struct FaultyPublisher {
    tree: AttributeTree,
    rejected: Mutex<HashSet<String>>,
}

impl FaultyPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes registration of `name` fail.
    pub fn reject(&self, name: impl Into<String>) {
        self.rejected.lock().insert(name.into());
    }

    /// The tree accepted devices are published to.
    pub fn tree(&self) -> &AttributeTree {
        &self.tree
    }
}

impl AttributePublisher for FaultyPublisher {
    fn publish(&self, device: &PublishedDevice) -> Result<(), AttributeError> {
        if self.rejected.lock().contains(&device.name) {
            return Err(AttributeError::Rejected {
                device: device.dev_name.clone(),
                reason: "injected fault".to_string(),
            });
        }
        self.tree.publish(device)
    }

    fn unpublish(&self, dev_name: &str) {
        self.tree.unpublish(dev_name);
    }
}

/// A registry on simulated hardware with a manual clock.
pub struct TestBench {
    pub irq: Arc<SimIrqChip>,
    pub gpio: Arc<SimGpioChip>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<FaultyPublisher>,
    pub registry: PulseCounterRegistry,
}

impl TestBench {
    pub fn new() -> Self {
        Self::with_config(ClassConfig::default())
    }

    pub fn with_config(config: ClassConfig) -> Self {
        let irq = Arc::new(SimIrqChip::new());
        let gpio = Arc::new(SimGpioChip::new(BENCH_GPIO_LINES, Some(BENCH_IRQ_BASE)));
        let clock = Arc::new(ManualClock::new(BENCH_EPOCH));
        let publisher = Arc::new(FaultyPublisher::new());
        let class = Arc::new(
            PulseCounterClass::new(config)
                .with_clock(clock.clone())
                .with_publisher(publisher.clone()),
        );
        let registry = PulseCounterRegistry::new(class, irq.clone(), gpio.clone());

        Self {
            irq,
            gpio,
            clock,
            publisher,
            registry,
        }
    }

    pub fn class(&self) -> &Arc<PulseCounterClass> {
        self.registry.class()
    }

    pub fn tree(&self) -> &AttributeTree {
        self.publisher.tree()
    }

    /// Reads an attribute path, panicking on error.
    pub fn read(&self, path: &str) -> String {
        self.tree()
            .read(self.class(), path)
            .unwrap_or_else(|e| panic!("read {path}: {e}"))
    }

    /// Writes an attribute path, panicking on error.
    pub fn write(&self, path: &str, text: &str) {
        self.tree()
            .write(self.class(), path, text)
            .unwrap_or_else(|e| panic!("write {path}: {e}"));
    }

    /// Handle of the bound device for node `name`.
    pub fn device(&self, name: &str) -> DeviceId {
        self.registry
            .devices()
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id)
            .unwrap_or_else(|| panic!("no device bound for '{name}'"))
    }

    /// Sets the clock, then raises `line`.
    pub fn pulse_at(&self, line: IrqNumber, at: TimeVal) -> usize {
        self.clock.set(at);
        self.irq.fire(line)
    }
}

impl Default for TestBench {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware description fixtures
pub mod tree_fixtures {
    use gpio_pulsed::{DeviceNode, DeviceTree};

    /// A node driven by GPIO `gpio`, interrupt derived from the pin.
    pub fn gpio_node(name: &str, gpio: i64) -> DeviceNode {
        DeviceNode::new(name).with_gpio(gpio)
    }

    /// A node with an explicit interrupt and no GPIO.
    pub fn irq_node(name: &str, irq: u32) -> DeviceNode {
        DeviceNode::new(name).with_interrupt(irq)
    }

    /// Three GPIO-driven meters on pins 1, 2 and 3.
    pub fn three_meters() -> DeviceTree {
        DeviceTree::new()
            .with_child(gpio_node("meter-1", 1))
            .with_child(gpio_node("meter-2", 2))
            .with_child(gpio_node("meter-3", 3))
    }

    /// Two sources sharing interrupt `irq`.
    pub fn shared_line(irq: u32) -> DeviceTree {
        DeviceTree::new()
            .with_child(irq_node("left", irq))
            .with_child(irq_node("right", irq))
    }
}
