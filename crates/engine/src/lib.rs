//! Serialized dispatch engine
//!
//! This crate ties the state store to a single dispatch loop:
//! - Engine: the shared handle (registration, lifecycle, state access)
//! - HandlerRegistry: type-erased handlers bound to partitions
//! - Dispatch loop: one thread, requests served strictly one at a time
//! - Gateway: act / act_async / submit / act_timeout and [`Pending`] replies
//! - EngineBuilder: inbound queue capacity and thread naming

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod dispatch;
pub mod engine;
pub mod gateway;
mod registry;

pub use config::{EngineBuilder, EngineConfig, DEFAULT_THREAD_NAME};
pub use engine::{Engine, EngineStats};
pub use gateway::Pending;

pub use switchyard_core::{BoxError, Error, HandlerId, HandlerKey, Payload, Result, StateId, StateKey};
pub use switchyard_storage::{StateGuard, StateStore};
