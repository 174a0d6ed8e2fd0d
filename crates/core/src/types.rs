//! Identifier types for state partitions and handlers
//!
//! Both identifier families are allocated monotonically from 0 and are never
//! reused. The raw forms ([`StateId`], [`HandlerId`]) are plain numbers; the
//! typed forms ([`StateKey`], [`HandlerKey`]) additionally carry the value
//! types they address so that a key cannot be used with the wrong payload.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Type-erased request payload or handler output travelling through the
/// dispatch loop.
///
/// Remembers the name of the concrete type so a failed downcast can report
/// both sides of the mismatch.
pub struct Payload {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Payload {
    /// Erase a value.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Payload {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the erased type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether the erased value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Recover the value as a `T`.
    pub fn downcast<T: 'static>(self) -> crate::Result<T> {
        let actual = self.type_name;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| crate::Error::wrong_type::<T>(actual))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload<{}>", self.type_name)
    }
}

/// Raw identifier of one state partition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StateId(pub u64);

impl StateId {
    /// First identifier handed out by a fresh store.
    pub const ZERO: StateId = StateId(0);

    /// Wrap a raw number.
    #[inline]
    pub fn new(id: u64) -> Self {
        StateId(id)
    }

    /// The raw number.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The identifier allocated after this one.
    #[inline]
    pub fn next(self) -> Self {
        StateId(self.0 + 1)
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({})", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Raw identifier of one registered handler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HandlerId(pub u64);

impl HandlerId {
    /// First identifier handed out by a fresh registry.
    pub const ZERO: HandlerId = HandlerId(0);

    /// Wrap a raw number.
    #[inline]
    pub fn new(id: u64) -> Self {
        HandlerId(id)
    }

    /// The raw number.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The identifier allocated after this one.
    #[inline]
    pub fn next(self) -> Self {
        HandlerId(self.0 + 1)
    }
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.0)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Typed key addressing a state partition holding a `T`.
///
/// Returned by partition allocation. The type parameter is a compile-time
/// tag only; the store still checks the stored type on every access, which
/// matters for keys rebuilt with [`StateKey::from_raw`].
pub struct StateKey<T> {
    id: StateId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    /// Rebuild a typed key from a raw identifier.
    ///
    /// Accesses through a key whose `T` does not match the stored value fail
    /// with [`crate::Error::WrongType`].
    pub fn from_raw(id: StateId) -> Self {
        StateKey {
            id,
            _marker: PhantomData,
        }
    }

    /// The raw identifier.
    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> PartialEq for StateKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for StateKey<T> {}

impl<T> Hash for StateKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey<{}>({})", std::any::type_name::<T>(), self.id.0)
    }
}

impl<T> fmt::Display for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

/// Typed key addressing a registered handler that takes `I` and produces `O`.
pub struct HandlerKey<I, O> {
    id: HandlerId,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> HandlerKey<I, O> {
    /// Rebuild a typed key from a raw identifier.
    ///
    /// The dispatch loop validates the payload type when the request is
    /// served; a mismatch fails the request with [`crate::Error::WrongType`].
    pub fn from_raw(id: HandlerId) -> Self {
        HandlerKey {
            id,
            _marker: PhantomData,
        }
    }

    /// The raw identifier.
    #[inline]
    pub fn id(&self) -> HandlerId {
        self.id
    }
}

impl<I, O> Clone for HandlerKey<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for HandlerKey<I, O> {}

impl<I, O> PartialEq for HandlerKey<I, O> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<I, O> Eq for HandlerKey<I, O> {}

impl<I, O> Hash for HandlerKey<I, O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<I, O> fmt::Debug for HandlerKey<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerKey({})", self.id.0)
    }
}

impl<I, O> fmt::Display for HandlerKey<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
