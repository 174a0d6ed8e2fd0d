//! Core types for Switchyard
//!
//! This crate defines the types shared by every layer:
//! - Identifiers (StateId, HandlerId) and their typed keys
//! - The type-erased request payload
//! - Error and Result

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{BoxError, Error, Result};
pub use types::{HandlerId, HandlerKey, Payload, StateId, StateKey};
