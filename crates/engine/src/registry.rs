//! Handler registry
//!
//! Maps each [`HandlerId`] to a type-erased handler bound to one state
//! partition. The map and its allocation counter share one lock, so
//! registration is safe from any thread at any time.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use switchyard_core::{HandlerId, Payload, Result, StateId, StateKey};

use crate::Engine;

/// A handler with its input and output types erased.
pub(crate) trait ErasedHandler: Send + Sync {
    /// Partition this handler owns.
    fn state(&self) -> StateId;

    /// Run the behavior on a payload.
    fn invoke(&self, engine: &Engine, input: Payload) -> Result<Payload>;
}

/// A behavior closure together with the partition it was registered against.
pub(crate) struct TypedHandler<S, I, O, F> {
    state: StateKey<S>,
    behavior: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<S, I, O, F> TypedHandler<S, I, O, F>
where
    F: Fn(&Engine, StateKey<S>, I) -> Result<O>,
{
    pub(crate) fn new(state: StateKey<S>, behavior: F) -> Self {
        TypedHandler {
            state,
            behavior,
            _marker: PhantomData,
        }
    }
}

impl<S, I, O, F> ErasedHandler for TypedHandler<S, I, O, F>
where
    S: 'static,
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&Engine, StateKey<S>, I) -> Result<O> + Send + Sync + 'static,
{
    fn state(&self) -> StateId {
        self.state.id()
    }

    fn invoke(&self, engine: &Engine, input: Payload) -> Result<Payload> {
        let input = input.downcast::<I>()?;
        (self.behavior)(engine, self.state, input).map(Payload::new)
    }
}

#[derive(Default)]
struct Handlers {
    map: FxHashMap<HandlerId, Arc<dyn ErasedHandler>>,
    next_id: HandlerId,
}

/// Registered handlers keyed by [`HandlerId`].
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: RwLock<Handlers>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a handler under the next identifier.
    pub(crate) fn insert(&self, handler: Arc<dyn ErasedHandler>) -> HandlerId {
        let mut handlers = self.handlers.write();
        let id = handlers.next_id;
        handlers.next_id = id.next();
        handlers.map.insert(id, handler);
        id
    }

    /// Look up a handler.
    ///
    /// The returned `Arc` is cloned out of the lock, so the caller may invoke
    /// it while other threads register.
    pub(crate) fn get(&self, id: HandlerId) -> Option<Arc<dyn ErasedHandler>> {
        self.handlers.read().map.get(&id).cloned()
    }

    pub(crate) fn contains(&self, id: HandlerId) -> bool {
        self.handlers.read().map.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.read().map.len()
    }
}
