//! Engine configuration and builder

use crate::Engine;

/// Default name of the dispatch thread.
pub const DEFAULT_THREAD_NAME: &str = "switchyard-dispatch";

/// Engine configuration.
///
/// The defaults reproduce a pure rendezvous engine: a submission completes
/// only when the dispatch loop takes the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of the inbound request queue.
    ///
    /// `Some(0)` is a rendezvous handoff, `Some(n)` lets up to `n` requests
    /// wait in the queue, `None` never blocks submitters.
    pub inbox_capacity: Option<usize>,
    /// Name given to the dispatch thread.
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            inbox_capacity: Some(0),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Builder for engine configuration.
///
/// # Example
///
/// ```ignore
/// let engine = Engine::builder()
///     .inbox_capacity(64)
///     .thread_name("orders-dispatch")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let up to `capacity` requests wait in the inbound queue.
    pub fn inbox_capacity(mut self, capacity: usize) -> Self {
        self.config.inbox_capacity = Some(capacity);
        self
    }

    /// Hand every request directly to the dispatch loop (the default).
    pub fn rendezvous(mut self) -> Self {
        self.config.inbox_capacity = Some(0);
        self
    }

    /// Never block submitters on the inbound queue.
    pub fn unbounded(mut self) -> Self {
        self.config.inbox_capacity = None;
        self
    }

    /// Name the dispatch thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the engine. The dispatch loop is not started.
    pub fn build(self) -> Engine {
        Engine::with_config(self.config)
    }
}
