//! The `counters` device class.
//!
//! [`CounterClass`] owns every counter device, hands out [`DeviceId`]
//! handles, and exposes the measurement engine per device. Devices are
//! reference counted: [`allocate`](CounterClass::allocate) returns a handle
//! holding one reference, [`acquire`](CounterClass::acquire) adds one, and
//! [`release`](CounterClass::release) drops one. Destruction happens in
//! exactly one place, when `release` takes the count from 1 to 0.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::attributes::{AttributePublisher, NullPublisher, PublishedDevice};
use crate::clock::{Clock, SystemClock};
use crate::config::ClassConfig;
use crate::device::{CounterDevice, DeviceArena, DeviceId, DeviceState};
use crate::error::{CounterError, CounterResult};
use crate::measurement::Measurements;
use crate::time::TimeVal;
use crate::{DEVICE_CLASS, DEVICE_NAME};

/// Driver callback run once when a device is destroyed, before its payload
/// is dropped.
pub type ShutdownHook<P> = Box<dyn FnOnce(DeviceId, &mut P) + Send>;

/// Device class for pulse counters.
///
/// `P` is the driver payload stored with each device.
pub struct CounterClass<P> {
    /// Live devices.
    devices: RwLock<DeviceArena<P>>,

    /// Process-wide clear-on-read flag.
    clear_count_when_reading: AtomicBool,

    /// One reference per live device, held on behalf of the owning driver.
    usage: AtomicUsize,

    /// Sequence for `counterN` names.
    next_number: AtomicU64,

    max_devices: Option<usize>,

    publisher: Arc<dyn AttributePublisher>,

    clock: Arc<dyn Clock>,
}

impl<P: Send + 'static> CounterClass<P> {
    /// Creates an empty class using the system clock and no attribute
    /// surface.
    pub fn new(config: ClassConfig) -> Self {
        Self {
            devices: RwLock::new(DeviceArena::new()),
            clear_count_when_reading: AtomicBool::new(config.clear_count_when_reading),
            usage: AtomicUsize::new(0),
            next_number: AtomicU64::new(0),
            max_devices: config.max_devices,
            publisher: Arc::new(NullPublisher),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to timestamp pulses.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the attribute interface devices are published through.
    pub fn with_publisher(mut self, publisher: Arc<dyn AttributePublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    fn device(&self, id: DeviceId) -> CounterResult<Arc<CounterDevice<P>>> {
        self.devices
            .read()
            .get(id)
            .cloned()
            .ok_or(CounterError::NoSuchDevice { id })
    }

    // ---- lifecycle ----

    /// Creates a device named `name` holding `payload`.
    ///
    /// The returned handle owns the device's only reference. Nothing is
    /// left behind on failure.
    #[instrument(skip(self, payload))]
    pub fn allocate(&self, name: &str, payload: P) -> CounterResult<DeviceId> {
        let mut owned = String::new();
        owned
            .try_reserve_exact(name.len())
            .map_err(|_| CounterError::allocation("device name"))?;
        owned.push_str(name);

        let number = self.next_number.fetch_add(1, Ordering::Relaxed);
        let dev_name = format!("{DEVICE_NAME}{number}");
        let devnode = format!("{DEVICE_CLASS}/{dev_name}");
        let device = Arc::new(CounterDevice::new(owned, dev_name, devnode, payload));

        let id = {
            let mut devices = self.devices.write();
            if let Some(max) = self.max_devices {
                if devices.len() >= max {
                    warn!("Device limit of {} reached, refusing '{}'", max, name);
                    return Err(CounterError::allocation(format!(
                        "device slot (limit of {max} reached)"
                    )));
                }
            }
            devices
                .try_insert(device)
                .ok_or_else(|| CounterError::allocation("device slot"))?
        };
        self.usage.fetch_add(1, Ordering::AcqRel);

        debug!("Allocated counter{} for '{}' as {}", number, name, id);
        Ok(id)
    }

    /// Publishes the device through the attribute interface.
    ///
    /// The publisher runs with no device lock held and may call back into
    /// the class. On failure the device returns to `Allocated` and the
    /// caller still owns its reference.
    #[instrument(skip(self))]
    pub fn register(&self, id: DeviceId) -> CounterResult<()> {
        let device = self.device(id)?;
        {
            let mut state = device.state.lock();
            if *state != DeviceState::Allocated {
                return Err(CounterError::invalid_argument(format!(
                    "{} is {}, cannot register",
                    device.dev_name, *state
                )));
            }
            *state = DeviceState::Registered;
        }

        let published = PublishedDevice {
            id,
            dev_name: device.dev_name.clone(),
            name: device.name.clone(),
            devnode: device.devnode.clone(),
        };
        if let Err(source) = self.publisher.publish(&published) {
            let mut state = device.state.lock();
            // an unregister that raced the publish keeps its state
            if *state == DeviceState::Registered {
                *state = DeviceState::Allocated;
            }
            return Err(CounterError::RegistrationFailure {
                device: device.dev_name.clone(),
                source,
            });
        }

        if *device.state.lock() != DeviceState::Registered {
            // unregistered while publishing
            self.publisher.unpublish(&device.dev_name);
        }
        info!("Registered {} ({})", device.dev_name, device.name);
        Ok(())
    }

    /// Withdraws the device from the attribute interface and drops the
    /// caller's reference.
    #[instrument(skip(self))]
    pub fn unregister(&self, id: DeviceId) -> CounterResult<()> {
        let device = self.device(id)?;
        {
            let mut state = device.state.lock();
            if *state == DeviceState::Registered {
                self.publisher.unpublish(&device.dev_name);
                *state = DeviceState::Unregistered;
                info!("Unregistered {} ({})", device.dev_name, device.name);
            }
        }
        drop(device);
        self.release(id)
    }

    /// Takes an additional reference for a new holder of `id`.
    pub fn acquire(&self, id: DeviceId) -> CounterResult<DeviceId> {
        let device = self.device(id)?;
        device
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                if count == 0 {
                    None
                } else {
                    count.checked_add(1)
                }
            })
            .map_err(|_| CounterError::NoSuchDevice { id })?;
        Ok(id)
    }

    /// Drops one reference, destroying the device when it was the last.
    pub fn release(&self, id: DeviceId) -> CounterResult<()> {
        let device = self.device(id)?;
        let previous = device
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .map_err(|_| CounterError::NoSuchDevice { id })?;

        if previous == 1 {
            self.destroy(id, device);
        }
        Ok(())
    }

    fn destroy(&self, id: DeviceId, device: Arc<CounterDevice<P>>) {
        self.devices.write().remove(id);

        let hook = device.shutdown.lock().take();
        let payload = device.payload.lock().take();
        if let Some(mut payload) = payload {
            if let Some(hook) = hook {
                hook(id, &mut payload);
            }
            drop(payload);
        }

        self.usage.fetch_sub(1, Ordering::AcqRel);
        debug!("Destroyed {} ({})", device.dev_name, device.name);
    }

    /// Installs the hook run at destruction, replacing any earlier one.
    pub fn set_shutdown<F>(&self, id: DeviceId, hook: F) -> CounterResult<()>
    where
        F: FnOnce(DeviceId, &mut P) + Send + 'static,
    {
        let device = self.device(id)?;
        *device.shutdown.lock() = Some(Box::new(hook));
        Ok(())
    }

    /// Runs `f` with exclusive access to the device payload.
    pub fn with_payload<R>(&self, id: DeviceId, f: impl FnOnce(&mut P) -> R) -> CounterResult<R> {
        let device = self.device(id)?;
        let mut payload = device.payload.lock();
        match payload.as_mut() {
            Some(payload) => Ok(f(payload)),
            None => Err(CounterError::NoSuchDevice { id }),
        }
    }

    // ---- measurement engine ----

    /// Records a pulse timestamped by the class clock.
    pub fn record_pulse(&self, id: DeviceId) -> CounterResult<()> {
        let device = self.device(id)?;
        let now = self.clock.now();
        device.measurements.lock().record_pulse(now);
        Ok(())
    }

    /// Records a pulse observed at `now`.
    pub fn record_pulse_at(&self, id: DeviceId, now: TimeVal) -> CounterResult<()> {
        let device = self.device(id)?;
        device.measurements.lock().record_pulse(now);
        Ok(())
    }

    /// Reads the pulse count, clearing it if `clear_count_when_reading` is
    /// set.
    pub fn snapshot_count(&self, id: DeviceId) -> CounterResult<u64> {
        let device = self.device(id)?;
        let clear = self.clear_count_when_reading();
        let value = device.measurements.lock().snapshot_count(clear);
        Ok(value)
    }

    /// Parses `text` as an unsigned integer and overwrites the count.
    ///
    /// Surrounding whitespace is ignored. Malformed input leaves the count
    /// unchanged.
    pub fn set_count(&self, id: DeviceId, text: &str) -> CounterResult<()> {
        let device = self.device(id)?;
        let value: u64 = text.trim().parse().map_err(|_| {
            CounterError::invalid_argument(format!("'{}' is not an unsigned integer", text.trim()))
        })?;
        device.measurements.lock().set_count(value);
        Ok(())
    }

    pub fn snapshot_last_period(&self, id: DeviceId) -> CounterResult<TimeVal> {
        let device = self.device(id)?;
        let value = device.measurements.lock().last_pulse_period();
        Ok(value)
    }

    pub fn snapshot_average_period(&self, id: DeviceId) -> CounterResult<TimeVal> {
        let device = self.device(id)?;
        let value = device.measurements.lock().average_pulse_period();
        Ok(value)
    }

    pub fn reset_last_period(&self, id: DeviceId) -> CounterResult<()> {
        let device = self.device(id)?;
        device.measurements.lock().reset_last_period();
        Ok(())
    }

    pub fn reset_average_period(&self, id: DeviceId) -> CounterResult<()> {
        let device = self.device(id)?;
        device.measurements.lock().reset_average_period();
        Ok(())
    }

    /// Copies all statistics under a single lock acquisition. Never clears
    /// the count.
    pub fn snapshot(&self, id: DeviceId) -> CounterResult<Measurements> {
        let device = self.device(id)?;
        let value = *device.measurements.lock();
        Ok(value)
    }

    // ---- class-wide flag ----

    pub fn clear_count_when_reading(&self) -> bool {
        self.clear_count_when_reading.load(Ordering::Relaxed)
    }

    pub fn set_clear_count_when_reading(&self, enabled: bool) {
        self.clear_count_when_reading.store(enabled, Ordering::Relaxed);
    }

    // ---- introspection ----

    /// Resource name given at allocation.
    pub fn name(&self, id: DeviceId) -> CounterResult<String> {
        Ok(self.device(id)?.name.clone())
    }

    /// Class device name (`counterN`).
    pub fn dev_name(&self, id: DeviceId) -> CounterResult<String> {
        Ok(self.device(id)?.dev_name.clone())
    }

    /// Device node path (`counters/counterN`).
    pub fn devnode(&self, id: DeviceId) -> CounterResult<String> {
        Ok(self.device(id)?.devnode.clone())
    }

    pub fn state(&self, id: DeviceId) -> CounterResult<DeviceState> {
        Ok(*self.device(id)?.state.lock())
    }

    /// Current reference count; 0 for a destroyed handle.
    pub fn refcount(&self, id: DeviceId) -> usize {
        self.device(id)
            .map(|device| device.refcount.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Returns true while `id` refers to an undestroyed device.
    pub fn is_alive(&self, id: DeviceId) -> bool {
        self.refcount(id) > 0
    }

    /// Handles of all live devices.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().ids()
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Module-usage references currently held.
    pub fn usage_count(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    /// Returns true when no device is live and no usage reference is held.
    pub fn is_idle(&self) -> bool {
        self.device_count() == 0 && self.usage_count() == 0
    }
}
