//! Attribute endpoints of the `counters` class.
//!
//! Every registered device exposes a read-only `name` and a `values` group:
//!
//! | Endpoint | Mode | Read | Write |
//! |---|---|---|---|
//! | `name` | ro | resource name | - |
//! | `values/pulse` | wo | - | records one pulse |
//! | `values/count` | rw | pulse count | overwrites the count |
//! | `values/last_pulse_period` | rw | `<sec><usec>` or `0` | resets to `0` |
//! | `values/average_pulse_period` | rw | `<sec><usec>` or `0` | resets to `0` |
//!
//! The class itself exposes `clear_count_when_reading` (`0`/`1`).
//!
//! Reads end with a newline. Writes report the number of bytes consumed.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use tracing::debug;

use crate::class::CounterClass;
use crate::device::DeviceId;
use crate::error::{AttributeError, CounterError, CounterResult};

/// Name of the per-device attribute group.
pub const VALUES_GROUP: &str = "values";

/// Access mode of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AttrMode {
    pub fn is_readable(&self) -> bool {
        matches!(self, AttrMode::ReadOnly | AttrMode::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, AttrMode::WriteOnly | AttrMode::ReadWrite)
    }

    /// Permission bits as a sysfs attribute would carry them.
    pub fn permissions(&self) -> u16 {
        match self {
            AttrMode::ReadOnly => 0o444,
            AttrMode::WriteOnly => 0o200,
            AttrMode::ReadWrite => 0o644,
        }
    }
}

/// Per-device endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceAttribute {
    Name,
    Pulse,
    Count,
    LastPulsePeriod,
    AveragePulsePeriod,
}

impl DeviceAttribute {
    pub const ALL: [DeviceAttribute; 5] = [
        DeviceAttribute::Name,
        DeviceAttribute::Pulse,
        DeviceAttribute::Count,
        DeviceAttribute::LastPulsePeriod,
        DeviceAttribute::AveragePulsePeriod,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeviceAttribute::Name => "name",
            DeviceAttribute::Pulse => "pulse",
            DeviceAttribute::Count => "count",
            DeviceAttribute::LastPulsePeriod => "last_pulse_period",
            DeviceAttribute::AveragePulsePeriod => "average_pulse_period",
        }
    }

    pub fn mode(&self) -> AttrMode {
        match self {
            DeviceAttribute::Name => AttrMode::ReadOnly,
            DeviceAttribute::Pulse => AttrMode::WriteOnly,
            DeviceAttribute::Count
            | DeviceAttribute::LastPulsePeriod
            | DeviceAttribute::AveragePulsePeriod => AttrMode::ReadWrite,
        }
    }

    /// The group the endpoint lives in; `None` for the device directory.
    pub fn group(&self) -> Option<&'static str> {
        match self {
            DeviceAttribute::Name => None,
            _ => Some(VALUES_GROUP),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.name() == name)
    }
}

impl fmt::Display for DeviceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Class-wide endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassAttribute {
    ClearCountWhenReading,
}

impl ClassAttribute {
    pub const ALL: [ClassAttribute; 1] = [ClassAttribute::ClearCountWhenReading];

    pub fn name(&self) -> &'static str {
        match self {
            ClassAttribute::ClearCountWhenReading => "clear_count_when_reading",
        }
    }

    pub fn mode(&self) -> AttrMode {
        AttrMode::ReadWrite
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.name() == name)
    }
}

impl fmt::Display for ClassAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What the class hands to the attribute interface on registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDevice {
    pub id: DeviceId,
    /// Class device name (`counterN`), the device directory.
    pub dev_name: String,
    /// Resource name, the content of the `name` endpoint.
    pub name: String,
    pub devnode: String,
}

impl PublishedDevice {
    /// Relative path of `attr` for this device, e.g. `counter0/values/count`.
    pub fn attribute_path(&self, attr: DeviceAttribute) -> String {
        match attr.group() {
            Some(group) => format!("{}/{}/{}", self.dev_name, group, attr.name()),
            None => format!("{}/{}", self.dev_name, attr.name()),
        }
    }
}

/// The external surface devices are published through.
pub trait AttributePublisher: Send + Sync {
    /// Makes the device's endpoints visible.
    fn publish(&self, device: &PublishedDevice) -> Result<(), AttributeError>;

    /// Removes every endpoint of `dev_name`.
    fn unpublish(&self, dev_name: &str);
}

/// Publisher that accepts every device and exposes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl AttributePublisher for NullPublisher {
    fn publish(&self, _device: &PublishedDevice) -> Result<(), AttributeError> {
        Ok(())
    }

    fn unpublish(&self, _dev_name: &str) {}
}

#[derive(Debug, Default)]
struct TreeInner {
    /// Attribute path to endpoint.
    entries: BTreeMap<String, (DeviceId, DeviceAttribute)>,
    /// Device directory to handle.
    devices: BTreeMap<String, DeviceId>,
}

/// In-memory attribute interface keyed by sysfs-like paths.
///
/// Reads and writes hold a device reference for the duration of the
/// dispatch, so a concurrent unregister defers destruction until the call
/// completes.
#[derive(Debug, Default)]
pub struct AttributeTree {
    inner: RwLock<TreeInner>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, path: &str) -> CounterResult<(DeviceId, DeviceAttribute)> {
        self.inner
            .read()
            .entries
            .get(path)
            .copied()
            .ok_or_else(|| {
                AttributeError::NotFound {
                    path: path.to_string(),
                }
                .into()
            })
    }

    /// Reads the endpoint at `path`.
    pub fn read<P: Send + 'static>(
        &self,
        class: &CounterClass<P>,
        path: &str,
    ) -> CounterResult<String> {
        if let Some(attr) = ClassAttribute::from_name(path) {
            return Ok(class.show_class(attr));
        }

        let (id, attr) = self.lookup(path)?;
        class.acquire(id)?;
        let result = class.show(id, attr);
        class.release(id)?;
        result
    }

    /// Writes `text` to the endpoint at `path`.
    pub fn write<P: Send + 'static>(
        &self,
        class: &CounterClass<P>,
        path: &str,
        text: &str,
    ) -> CounterResult<usize> {
        if let Some(attr) = ClassAttribute::from_name(path) {
            return class.store_class(attr, text);
        }

        let (id, attr) = self.lookup(path)?;
        class.acquire(id)?;
        let result = class.store(id, attr, text);
        class.release(id)?;
        result
    }

    /// All published paths, class endpoints first, then in sorted order.
    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.read();
        ClassAttribute::ALL
            .iter()
            .map(|attr| attr.name().to_string())
            .chain(inner.entries.keys().cloned())
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        ClassAttribute::from_name(path).is_some() || self.inner.read().entries.contains_key(path)
    }

    /// Published device directories.
    pub fn devices(&self) -> Vec<String> {
        self.inner.read().devices.keys().cloned().collect()
    }

    /// Handle of the device published as `dev_name`.
    pub fn device_id(&self, dev_name: &str) -> Option<DeviceId> {
        self.inner.read().devices.get(dev_name).copied()
    }
}

impl AttributePublisher for AttributeTree {
    fn publish(&self, device: &PublishedDevice) -> Result<(), AttributeError> {
        let mut inner = self.inner.write();
        if inner.devices.contains_key(&device.dev_name) {
            return Err(AttributeError::Exists {
                path: device.dev_name.clone(),
            });
        }

        inner.devices.insert(device.dev_name.clone(), device.id);
        for attr in DeviceAttribute::ALL {
            inner
                .entries
                .insert(device.attribute_path(attr), (device.id, attr));
        }
        debug!("Published {} ({})", device.dev_name, device.name);
        Ok(())
    }

    fn unpublish(&self, dev_name: &str) {
        let mut inner = self.inner.write();
        if let Some(id) = inner.devices.remove(dev_name) {
            inner.entries.retain(|_, (entry, _)| *entry != id);
            debug!("Unpublished {}", dev_name);
        }
    }
}

fn denied(attribute: &str, access: &'static str) -> CounterError {
    CounterError::PermissionDenied {
        attribute: attribute.to_string(),
        access,
    }
}

impl<P: Send + 'static> CounterClass<P> {
    /// Renders a device endpoint.
    pub fn show(&self, id: DeviceId, attr: DeviceAttribute) -> CounterResult<String> {
        match attr {
            DeviceAttribute::Name => Ok(format!("{}\n", self.name(id)?)),
            DeviceAttribute::Pulse => Err(denied(attr.name(), "readable")),
            DeviceAttribute::Count => Ok(format!("{}\n", self.snapshot_count(id)?)),
            DeviceAttribute::LastPulsePeriod => {
                Ok(format!("{}\n", self.snapshot_last_period(id)?))
            }
            DeviceAttribute::AveragePulsePeriod => {
                Ok(format!("{}\n", self.snapshot_average_period(id)?))
            }
        }
    }

    /// Applies a write to a device endpoint and returns the bytes consumed.
    ///
    /// Writes to the period endpoints reset them whatever the content.
    pub fn store(&self, id: DeviceId, attr: DeviceAttribute, text: &str) -> CounterResult<usize> {
        match attr {
            DeviceAttribute::Name => return Err(denied(attr.name(), "writable")),
            DeviceAttribute::Pulse => self.record_pulse(id)?,
            DeviceAttribute::Count => self.set_count(id, text)?,
            DeviceAttribute::LastPulsePeriod => self.reset_last_period(id)?,
            DeviceAttribute::AveragePulsePeriod => self.reset_average_period(id)?,
        }
        Ok(text.len())
    }

    /// Renders a class endpoint.
    pub fn show_class(&self, attr: ClassAttribute) -> String {
        match attr {
            ClassAttribute::ClearCountWhenReading => {
                format!("{}\n", u8::from(self.clear_count_when_reading()))
            }
        }
    }

    /// Applies a write to a class endpoint. Any integer is accepted for the
    /// flag; non-zero enables it.
    pub fn store_class(&self, attr: ClassAttribute, text: &str) -> CounterResult<usize> {
        match attr {
            ClassAttribute::ClearCountWhenReading => {
                let value: i64 = text.trim().parse().map_err(|_| {
                    CounterError::invalid_argument(format!("'{}' is not an integer", text.trim()))
                })?;
                self.set_clear_count_when_reading(value != 0);
            }
        }
        Ok(text.len())
    }
}
