//! Device records and the index-stable device arena.

use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::class::ShutdownHook;
use crate::measurement::Measurements;

/// Handle to a device of a [`CounterClass`](crate::CounterClass).
///
/// The generation changes every time a slot is reused, so a handle kept past
/// the device's destruction is detected instead of aliasing a newer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    index: u32,
    generation: u32,
}

impl DeviceId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Packs the handle into a single word (generation in the high half).
    pub const fn as_u64(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

/// Lifecycle state of a live device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Allocated but not yet visible through the attribute interface.
    Allocated,
    /// Published through the attribute interface.
    Registered,
    /// Withdrawn from the attribute interface; destroyed once the last
    /// reference is released.
    Unregistered,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Allocated => "allocated",
            DeviceState::Registered => "registered",
            DeviceState::Unregistered => "unregistered",
        };
        write!(f, "{}", s)
    }
}

/// One counter device.
pub(crate) struct CounterDevice<P> {
    /// Resource name given by the driver (e.g. the hardware node name).
    pub(crate) name: String,
    /// Class device name, `counterN`.
    pub(crate) dev_name: String,
    /// Device node path relative to the device root.
    pub(crate) devnode: String,
    pub(crate) refcount: AtomicUsize,
    pub(crate) state: Mutex<DeviceState>,
    pub(crate) measurements: Mutex<Measurements>,
    /// Taken out at destruction.
    pub(crate) payload: Mutex<Option<P>>,
    pub(crate) shutdown: Mutex<Option<ShutdownHook<P>>>,
}

impl<P> CounterDevice<P> {
    pub(crate) fn new(name: String, dev_name: String, devnode: String, payload: P) -> Self {
        Self {
            name,
            dev_name,
            devnode,
            refcount: AtomicUsize::new(1),
            state: Mutex::new(DeviceState::Allocated),
            measurements: Mutex::new(Measurements::new()),
            payload: Mutex::new(Some(payload)),
            shutdown: Mutex::new(None),
        }
    }
}

struct Slot<P> {
    generation: u32,
    device: Option<Arc<CounterDevice<P>>>,
}

/// Slot storage addressed by [`DeviceId`].
///
/// The free list always has capacity for every slot, so removal never
/// allocates.
pub(crate) struct DeviceArena<P> {
    slots: Vec<Slot<P>>,
    free: Vec<u32>,
    live: usize,
}

impl<P> DeviceArena<P> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn get(&self, id: DeviceId) -> Option<&Arc<CounterDevice<P>>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.device.as_ref())
    }

    /// Stores `device` in a free slot, growing the arena fallibly if needed.
    ///
    /// Returns `None` when no slot can be reserved; `device` is dropped.
    pub(crate) fn try_insert(&mut self, device: Arc<CounterDevice<P>>) -> Option<DeviceId> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.device = Some(device);
            self.live += 1;
            return Some(DeviceId::new(index, slot.generation));
        }

        let index = u32::try_from(self.slots.len()).ok()?;
        self.slots.try_reserve(1).ok()?;
        let needed = (self.slots.len() + 1).saturating_sub(self.free.len());
        self.free.try_reserve(needed).ok()?;

        self.slots.push(Slot {
            generation: 0,
            device: Some(device),
        });
        self.live += 1;
        Some(DeviceId::new(index, 0))
    }

    /// Empties the slot of `id`, returning the device if the handle was current.
    pub(crate) fn remove(&mut self, id: DeviceId) -> Option<Arc<CounterDevice<P>>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let device = slot.device.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(device)
    }

    /// Handles of all live devices, in slot order.
    pub(crate) fn ids(&self) -> Vec<DeviceId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.device.is_some())
            .map(|(index, slot)| DeviceId::new(index as u32, slot.generation))
            .collect()
    }
}
