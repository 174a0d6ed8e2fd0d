//! Convenient imports for Switchyard.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use switchyard::prelude::*;
//!
//! let engine = Engine::builder().inbox_capacity(32).build();
//! engine.run()?;
//! ```

// Main entry point
pub use crate::{Engine, EngineBuilder, EngineConfig};

// Error handling
pub use crate::{Error, Result};

// Keys
pub use crate::{HandlerKey, StateKey};

// Deferred replies and batched state writes
pub use crate::{Pending, StateGuard};
