//! Partitioned state store
//!
//! One `parking_lot::RwLock` guards every partition. Readers clone values
//! out under the shared lock; every write takes the exclusive lock.
//!
//! # Batches
//!
//! [`StateStore::lock`] hands out a [`StateGuard`] holding the exclusive lock
//! for as long as it lives. Writes through the guard do not acquire anything
//! themselves, so a sequence such as "set 1, wait, set 0" is invisible to
//! concurrent readers until the guard is released.
//!
//! Calling [`StateStore::get`] or [`StateStore::set`] on a thread that already
//! holds a guard deadlocks. Use the guard's own accessors instead.

use std::any::{type_name, Any};
use std::fmt;

use parking_lot::{RwLock, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use switchyard_core::{Error, Result, StateId, StateKey};
use tracing::debug;

/// One partition: the value plus the name of its concrete type.
struct Slot {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Slot {
    fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Slot {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }
}

/// Partition map plus the allocation counter, guarded together.
#[derive(Default)]
struct Partitions {
    slots: FxHashMap<StateId, Slot>,
    next_id: StateId,
}

impl Partitions {
    fn get<T: 'static>(&self, key: StateKey<T>) -> Result<&T> {
        let slot = self
            .slots
            .get(&key.id())
            .ok_or(Error::StateNotFound(key.id()))?;
        slot.value
            .downcast_ref::<T>()
            .ok_or_else(|| Error::wrong_type::<T>(slot.type_name))
    }

    fn get_mut<T: 'static>(&mut self, key: StateKey<T>) -> Result<&mut T> {
        let slot = self
            .slots
            .get_mut(&key.id())
            .ok_or(Error::StateNotFound(key.id()))?;
        let actual = slot.type_name;
        slot.value
            .downcast_mut::<T>()
            .ok_or_else(|| Error::wrong_type::<T>(actual))
    }

    fn set<T: Send + Sync + 'static>(&mut self, key: StateKey<T>, value: T) -> Result<()> {
        *self.get_mut(key)? = value;
        Ok(())
    }
}

/// Thread-safe map from [`StateId`] to an arbitrary value.
///
/// Values of any `Send + Sync + 'static` type may be stored. The typed
/// [`StateKey`] returned by [`StateStore::allocate`] is checked against the
/// stored type on every access; a mismatch is reported as
/// [`Error::WrongType`].
pub struct StateStore {
    partitions: RwLock<Partitions>,
}

impl StateStore {
    /// Create an empty store. The first allocated partition is `s0`.
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(Partitions::default()),
        }
    }

    /// Allocate the next partition and store `initial` in it.
    pub fn allocate<T: Send + Sync + 'static>(&self, initial: T) -> StateKey<T> {
        let mut partitions = self.partitions.write();
        let id = partitions.next_id;
        partitions.next_id = id.next();
        partitions.slots.insert(id, Slot::new(initial));
        debug!(state = %id, ty = type_name::<T>(), "partition allocated");
        StateKey::from_raw(id)
    }

    /// Clone out the current value of a partition.
    pub fn get<T: Clone + 'static>(&self, key: StateKey<T>) -> Result<T> {
        self.partitions.read().get(key).cloned()
    }

    /// Replace the value of a partition under the exclusive lock.
    pub fn set<T: Send + Sync + 'static>(&self, key: StateKey<T>, value: T) -> Result<()> {
        self.partitions.write().set(key, value)
    }

    /// Read-modify-write a partition under one exclusive lock acquisition.
    pub fn update<T, R, F>(&self, key: StateKey<T>, f: F) -> Result<R>
    where
        T: 'static,
        F: FnOnce(&mut T) -> R,
    {
        let mut partitions = self.partitions.write();
        let value = partitions.get_mut(key)?;
        Ok(f(value))
    }

    /// Acquire the exclusive lock for a batch of writes.
    ///
    /// Blocks until every reader and writer has released. The lock is held
    /// until the guard is dropped or [`StateGuard::unlock`] is called.
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            partitions: self.partitions.write(),
        }
    }

    /// Check that a partition exists and holds a `T`, under the shared lock.
    pub fn check<T: 'static>(&self, key: StateKey<T>) -> Result<()> {
        self.partitions.read().get(key).map(|_| ())
    }

    /// Check whether a partition exists.
    pub fn contains(&self, id: StateId) -> bool {
        self.partitions.read().slots.contains_key(&id)
    }

    /// Number of allocated partitions.
    pub fn len(&self) -> usize {
        self.partitions.read().slots.len()
    }

    /// Check if no partition has been allocated yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("partitions", &self.len())
            .finish()
    }
}

/// Exclusive access to every partition of a [`StateStore`].
///
/// Holding a guard is what makes its writes safe: [`StateGuard::set`] writes
/// straight into the map without taking a lock of its own.
pub struct StateGuard<'a> {
    partitions: RwLockWriteGuard<'a, Partitions>,
}

impl StateGuard<'_> {
    /// Clone out a value through the held lock.
    pub fn get<T: Clone + 'static>(&self, key: StateKey<T>) -> Result<T> {
        self.partitions.get(key).cloned()
    }

    /// Write a value through the held lock.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: StateKey<T>, value: T) -> Result<()> {
        self.partitions.set(key, value)
    }

    /// Mutate a value in place through the held lock.
    pub fn update<T, R, F>(&mut self, key: StateKey<T>, f: F) -> Result<R>
    where
        T: 'static,
        F: FnOnce(&mut T) -> R,
    {
        Ok(f(self.partitions.get_mut(key)?))
    }

    /// Release the lock.
    pub fn unlock(self) {
        drop(self)
    }
}
