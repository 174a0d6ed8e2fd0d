//! Error types for Switchyard
//!
//! A single enum covers the engine's own failure modes and carries
//! handler-body failures through untouched.

use std::time::Duration;

use thiserror::Error;

use crate::types::{HandlerId, StateId};

/// Boxed error produced by a handler body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All Switchyard errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A request named a handler that was never registered.
    #[error("unknown handler: {0}")]
    UnknownHandler(HandlerId),

    /// The reply conduit closed without delivering a result.
    #[error("no response from handler {0}")]
    NoResponse(HandlerId),

    /// The inbound queue is closed.
    #[error("engine stopped")]
    EngineStopped,

    /// The dispatch loop was already started.
    #[error("engine already running")]
    AlreadyRunning,

    /// A request was submitted from the dispatch thread itself.
    #[error("reentrant call to handler {0} from the dispatch thread")]
    Reentrant(HandlerId),

    /// The caller stopped waiting for a reply.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No partition exists for this identifier.
    #[error("state not found: {0}")]
    StateNotFound(StateId),

    /// A stored value or payload did not have the expected type.
    #[error("wrong type: expected {expected}, got {actual}")]
    WrongType {
        /// Type the caller asked for
        expected: &'static str,
        /// Type actually present
        actual: &'static str,
    },

    /// A handler body reported a failure.
    #[error("handler failed: {0}")]
    Handler(BoxError),

    /// The dispatch thread could not be spawned.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for Switchyard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a handler-body failure.
    ///
    /// Accepts anything convertible into a boxed error, including `&str` and
    /// `String`.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Error::Handler(err.into())
    }

    /// Build a [`Error::WrongType`] for `T`.
    pub fn wrong_type<T: ?Sized>(actual: &'static str) -> Self {
        Error::WrongType {
            expected: std::any::type_name::<T>(),
            actual,
        }
    }

    /// Check if the engine refused the request because it is shut down.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Error::EngineStopped)
    }

    /// Check if the caller gave up waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Check if this error came from a handler body rather than the engine.
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Error::Handler(_))
    }

    /// The handler-body error, if this is one.
    pub fn handler_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Handler(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}
