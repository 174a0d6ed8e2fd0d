//! Storage layer for Switchyard
//!
//! This crate implements the partitioned state store:
//! - StateStore: FxHashMap of type-erased partitions behind one RwLock
//! - Monotonic partition allocation
//! - Typed get/set/update with runtime type validation
//! - StateGuard for exclusive multi-step batches

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;

pub use store::{StateGuard, StateStore};
