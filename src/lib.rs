//! # Switchyard
//!
//! Serialized-dispatch shared-state engine.
//!
//! Handlers are registered against typed state partitions and invoked one at
//! a time by a single dispatch loop, in the order their requests arrive.
//! Callers on any thread submit requests and either wait for the reply or
//! move on. State can also be read and written directly, outside the loop,
//! under a reader-writer lock.
//!
//! ## Quick Start
//!
//! ```ignore
//! use switchyard::prelude::*;
//!
//! let engine = Engine::new();
//!
//! // A partition holding a Vec, and a handler that appends to it
//! let (nums, push) = engine.register(Vec::new(), |eng: &Engine, sk, n: i32| {
//!     eng.update(sk, |v: &mut Vec<i32>| v.push(n))
//! });
//!
//! engine.run()?;
//!
//! engine.act(push, 1)?;        // wait for the handler
//! engine.act_async(push, 2)?;  // don't
//!
//! engine.shutdown();
//! assert_eq!(engine.get(nums)?, vec![1, 2]);
//! ```
//!
//! ## Calling Handlers
//!
//! - [`Engine::act`] - submit and wait for the result
//! - [`Engine::act_async`] - submit and discard the result
//! - [`Engine::submit`] - submit and collect later through [`Pending`]
//! - [`Engine::act_timeout`] - submit and give up waiting after a deadline
//!
//! ## Direct State Access
//!
//! - [`Engine::get`] / [`Engine::set`] / [`Engine::update`] - one lock
//!   acquisition each
//! - [`Engine::lock`] - a [`StateGuard`] for batches that must be observed
//!   as a whole

#![warn(missing_docs)]

pub mod prelude;

// Re-export main entry points
pub use switchyard_engine::{Engine, EngineBuilder, EngineConfig, EngineStats, Pending, DEFAULT_THREAD_NAME};

// Errors
pub use switchyard_core::{BoxError, Error, Result};

// Keys and payloads
pub use switchyard_core::{HandlerId, HandlerKey, Payload, StateId, StateKey};

// Storage
pub use switchyard_storage::{StateGuard, StateStore};
