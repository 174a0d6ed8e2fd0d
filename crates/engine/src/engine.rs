//! The engine aggregate
//!
//! [`Engine`] owns the state store, the handler registry and the inbound
//! queue of the dispatch loop. It is a cheap, clonable handle: every clone
//! addresses the same engine, and handler bodies receive one so they can
//! read and write state or spawn further work.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --run()--> Running --shutdown()--> Stopped
//!   \_____________shutdown()____________/
//! ```
//!
//! Registration and state access work in every phase. Submissions block
//! until the loop is running (rendezvous queue) and fail once stopped.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use switchyard_core::{Error, HandlerId, HandlerKey, Result, StateId, StateKey};
use switchyard_storage::{StateGuard, StateStore};
use tracing::{debug, warn};

use crate::config::{EngineBuilder, EngineConfig};
use crate::dispatch::{self, Request};
use crate::registry::{HandlerRegistry, TypedHandler};

/// Where the dispatch loop is in its life.
enum Lifecycle {
    /// Not started; the loop's receiver waits here.
    Idle(Receiver<Request>),
    /// Loop thread spawned.
    Running(JoinHandle<()>),
    /// Queue closed.
    Stopped,
}

/// Monotonic request counters.
#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) served: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) panicked: AtomicU64,
    pub(crate) open_conduits: Arc<AtomicUsize>,
}

/// State shared by every [`Engine`] handle.
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) store: StateStore,
    pub(crate) registry: HandlerRegistry,
    /// Producer side of the inbound queue; `None` once closed.
    pub(crate) inbox: RwLock<Option<Sender<Request>>>,
    lifecycle: Mutex<Lifecycle>,
    pub(crate) counters: Counters,
}

/// Point-in-time view of engine activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Requests accepted by the inbound queue
    pub submitted: u64,
    /// Requests whose handler was invoked
    pub served: u64,
    /// Requests answered with an error (unknown handler or handler failure)
    pub failed: u64,
    /// Handler invocations that panicked
    pub panicked: u64,
    /// Reply conduits with at least one live end
    pub open_conduits: usize,
    /// Registered handlers
    pub handlers: usize,
    /// Allocated state partitions
    pub partitions: usize,
    /// Whether the dispatch loop is accepting requests
    pub running: bool,
}

/// Serialized dispatch engine over a partitioned state store.
///
/// # Example
///
/// ```ignore
/// use switchyard::prelude::*;
///
/// let engine = Engine::new();
/// let (nums, push) = engine.register(Vec::new(), |eng: &Engine, sk, n: i32| {
///     eng.update(sk, |v: &mut Vec<i32>| v.push(n))
/// });
/// engine.run()?;
///
/// engine.act(push, 4)?;
/// assert_eq!(engine.get(nums)?, vec![4]);
/// engine.shutdown();
/// ```
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Shared>,
}

impl Engine {
    /// Create an engine with default settings. The loop is not started.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a builder for engine configuration.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine from an explicit configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let (tx, rx) = match config.inbox_capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };
        Engine {
            inner: Arc::new(Shared {
                config,
                store: StateStore::new(),
                registry: HandlerRegistry::new(),
                inbox: RwLock::new(Some(tx)),
                lifecycle: Mutex::new(Lifecycle::Idle(rx)),
                counters: Counters::default(),
            }),
        }
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The underlying state store.
    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a handler over a fresh partition holding `initial`.
    ///
    /// Returns the partition's key and the handler's key. Safe to call from
    /// any thread, before or after [`Engine::run`].
    pub fn register<S, I, O, F>(&self, initial: S, behavior: F) -> (StateKey<S>, HandlerKey<I, O>)
    where
        S: Send + Sync + 'static,
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(&Engine, StateKey<S>, I) -> Result<O> + Send + Sync + 'static,
    {
        let state = self.inner.store.allocate(initial);
        let handler = self.bind(state, behavior);
        (state, handler)
    }

    /// Register another handler over an existing partition.
    ///
    /// Fails with [`Error::StateNotFound`] if the partition does not exist and
    /// with [`Error::WrongType`] if it holds something other than `S`.
    pub fn register_on<S, I, O, F>(&self, state: StateKey<S>, behavior: F) -> Result<HandlerKey<I, O>>
    where
        S: Send + Sync + 'static,
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(&Engine, StateKey<S>, I) -> Result<O> + Send + Sync + 'static,
    {
        self.inner.store.check(state)?;
        Ok(self.bind(state, behavior))
    }

    /// Allocate a partition without binding a handler to it.
    pub fn allocate<T: Send + Sync + 'static>(&self, initial: T) -> StateKey<T> {
        self.inner.store.allocate(initial)
    }

    fn bind<S, I, O, F>(&self, state: StateKey<S>, behavior: F) -> HandlerKey<I, O>
    where
        S: Send + Sync + 'static,
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(&Engine, StateKey<S>, I) -> Result<O> + Send + Sync + 'static,
    {
        let id = self
            .inner
            .registry
            .insert(Arc::new(TypedHandler::new(state, behavior)));
        debug!(handler = %id, state = %state.id(), "handler registered");
        HandlerKey::from_raw(id)
    }

    /// Check whether a handler identifier is registered.
    pub fn is_registered(&self, id: HandlerId) -> bool {
        self.inner.registry.contains(id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the dispatch loop on its own thread. Does not block.
    ///
    /// Fails with [`Error::AlreadyRunning`] on a second call and with
    /// [`Error::EngineStopped`] after [`Engine::shutdown`]. If the thread
    /// cannot be spawned the engine is left stopped.
    pub fn run(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        let inbox = match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(inbox) => inbox,
            running @ Lifecycle::Running(_) => {
                *lifecycle = running;
                return Err(Error::AlreadyRunning);
            }
            Lifecycle::Stopped => return Err(Error::EngineStopped),
        };

        let shared = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new()
            .name(self.inner.config.thread_name.clone())
            .spawn(move || dispatch::run_loop(shared, inbox));

        match spawned {
            Ok(worker) => {
                *lifecycle = Lifecycle::Running(worker);
                debug!(thread = %self.inner.config.thread_name, "engine running");
                Ok(())
            }
            Err(e) => {
                self.inner.inbox.write().take();
                Err(Error::Spawn(e))
            }
        }
    }

    /// Check whether the dispatch loop is running and accepting requests.
    pub fn is_running(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Running(_))
            && self.inner.inbox.read().is_some()
    }

    /// Close the inbound queue and wait for the dispatch loop to drain.
    ///
    /// Requests already accepted are still served; later submissions fail
    /// with [`Error::EngineStopped`]. Idempotent. Called from a handler, the
    /// queue is closed but the loop is not joined (it would wait on itself).
    pub fn shutdown(&self) {
        let Some(inbox) = self.inner.inbox.write().take() else {
            return;
        };
        drop(inbox);

        let previous = mem::replace(&mut *self.inner.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running(worker) => {
                if dispatch::on_dispatch_thread(&self.inner) {
                    debug!("shutdown requested by a handler; loop exits after this request");
                    return;
                }
                if worker.join().is_err() {
                    warn!("dispatch thread terminated abnormally");
                }
                debug!("engine stopped");
            }
            Lifecycle::Idle(_) => debug!("engine stopped before it ran"),
            Lifecycle::Stopped => {}
        }
    }

    /// Snapshot the engine's counters.
    pub fn stats(&self) -> EngineStats {
        let counters = &self.inner.counters;
        EngineStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            served: counters.served.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            open_conduits: counters.open_conduits.load(Ordering::SeqCst),
            handlers: self.inner.registry.len(),
            partitions: self.inner.store.len(),
            running: self.is_running(),
        }
    }

    // =========================================================================
    // State access
    // =========================================================================

    /// Clone out the current value of a partition.
    pub fn get<T: Clone + 'static>(&self, key: StateKey<T>) -> Result<T> {
        self.inner.store.get(key)
    }

    /// Replace the value of a partition under the exclusive lock.
    pub fn set<T: Send + Sync + 'static>(&self, key: StateKey<T>, value: T) -> Result<()> {
        self.inner.store.set(key, value)
    }

    /// Read-modify-write a partition under one exclusive lock acquisition.
    pub fn update<T, R, F>(&self, key: StateKey<T>, f: F) -> Result<R>
    where
        T: 'static,
        F: FnOnce(&mut T) -> R,
    {
        self.inner.store.update(key, f)
    }

    /// Take the exclusive state lock for a batch of writes.
    ///
    /// Writes through the returned guard become visible to other threads
    /// only as a whole, when the guard is released. Do not call
    /// [`Engine::get`], [`Engine::set`] or [`Engine::update`] on the same
    /// thread while holding it.
    pub fn lock(&self) -> StateGuard<'_> {
        self.inner.store.lock()
    }

    /// Check whether a partition exists.
    pub fn has_state(&self, id: StateId) -> bool {
        self.inner.store.contains(id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}
