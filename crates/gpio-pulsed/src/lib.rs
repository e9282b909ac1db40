//! GPIO pulse counter driver and daemon.
//!
//! This crate binds pulse sources described by a hardware description to
//! devices of the `counters` class. Each source is a GPIO line or an
//! interrupt; every interrupt counts as one pulse.
//!
//! # Responsibilities
//!
//! - Walk the [`DeviceTree`] and create one counter device per usable node
//! - Reserve the node's GPIO and attach a shared interrupt handler
//! - Roll back exactly the failing node on error, keeping its siblings
//! - Tear everything down in probe order on removal
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use counters_class::ClassConfig;
//! use counters_hal::{IrqNumber, SimGpioChip, SimIrqChip};
//! use gpio_pulsed::{DeviceNode, DeviceTree, PulseCounterClass, PulseCounterRegistry};
//!
//! let irq = Arc::new(SimIrqChip::new());
//! let gpio = Arc::new(SimGpioChip::new(8, Some(32)));
//! let class = Arc::new(PulseCounterClass::new(ClassConfig::default()));
//! let registry = PulseCounterRegistry::new(class.clone(), irq.clone(), gpio);
//!
//! let tree = DeviceTree::new().with_child(DeviceNode::new("meter").with_gpio(2));
//! assert_eq!(registry.probe(Some(&tree)).unwrap(), 1);
//!
//! irq.fire(IrqNumber::new(34).unwrap());
//! let id = registry.devices()[0].id;
//! assert_eq!(class.snapshot_count(id).unwrap(), 1);
//!
//! registry.remove();
//! assert!(class.is_idle());
//! ```

pub mod config;
pub mod daemon;
pub mod description;
pub mod error;
pub mod registry;

pub use config::{DaemonConfig, SimulationConfig};
pub use daemon::{Daemon, DeviceReport, RunOptions};
pub use description::{DeviceNode, DeviceTree, COMPATIBLE};
pub use error::{ConfigError, RegistryError, RegistryResult};
pub use registry::{
    device_token, pulse_handler, shutdown_device, GpioPulseCounter, PulseCounterClass,
    PulseCounterRegistry, PulseSourceEntry,
};
