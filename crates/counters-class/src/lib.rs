//! Pulse counter device class.
//!
//! This crate implements the `counters` device class: devices that count
//! discrete pulse events and keep per-device timing statistics.
//!
//! - [`time`]: [`TimeVal`] seconds/microseconds arithmetic
//! - [`clock`]: The [`Clock`] source used to timestamp pulses
//! - [`measurement`]: The per-device [`Measurements`] engine
//! - [`class`]: [`CounterClass`], the device arena and lifecycle manager
//! - [`attributes`]: Attribute endpoints and the [`AttributePublisher`] contract
//! - [`config`]: Class-wide configuration
//! - [`error`]: Error types
//!
//! # Lifecycle
//!
//! ```text
//! allocate ──► register ──► (pulses, attribute reads/writes) ──► unregister ──► release
//!     │            │ failure                                                      │
//!     └────────────┴──────────────────────────► release ─────────────────────────►┘ destroyed
//! ```
//!
//! A device is destroyed exactly when its reference count drops from 1 to 0.
//! The driver's shutdown hook runs at that point, before the payload is
//! dropped.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use counters_class::{ClassConfig, CounterClass, ManualClock, TimeVal};
//!
//! let clock = Arc::new(ManualClock::new(TimeVal::new(10, 0)));
//! let class: CounterClass<()> = CounterClass::new(ClassConfig::default()).with_clock(clock.clone());
//!
//! let dev = class.allocate("pulse-a", ()).unwrap();
//! class.register(dev).unwrap();
//!
//! class.record_pulse(dev).unwrap();
//! clock.set(TimeVal::new(10, 500_000));
//! class.record_pulse(dev).unwrap();
//!
//! assert_eq!(class.snapshot_count(dev).unwrap(), 2);
//! assert_eq!(class.snapshot_last_period(dev).unwrap(), TimeVal::new(0, 500_000));
//!
//! class.unregister(dev).unwrap();
//! assert!(!class.is_alive(dev));
//! ```

pub mod attributes;
pub mod class;
pub mod clock;
pub mod config;
pub mod error;
pub mod measurement;
pub mod time;

mod device;

pub use attributes::{
    AttrMode, AttributePublisher, AttributeTree, ClassAttribute, DeviceAttribute, NullPublisher,
    PublishedDevice, VALUES_GROUP,
};
pub use class::{CounterClass, ShutdownHook};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClassConfig;
pub use device::{DeviceId, DeviceState};
pub use error::{AttributeError, CounterError, CounterResult};
pub use measurement::Measurements;
pub use time::{TimeVal, USEC_PER_SEC};

/// Device class name.
pub const DEVICE_CLASS: &str = "counters";

/// Base name of devices in the class (`counter0`, `counter1`, ...).
pub const DEVICE_NAME: &str = "counter";
