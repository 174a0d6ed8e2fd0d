//! Engine Contract Test Suite
//!
//! Verifies the guarantees callers rely on when sharing one engine across
//! threads.
//!
//! ## Key Verification Points
//!
//! 1. Handlers run one at a time, in arrival order
//! 2. Every caller receives the reply computed from its own request
//! 3. Partitions are isolated and batched writes are observed as a whole
//! 4. Reply conduits never leak, whatever happens to the request
//! 5. Engine failures are reported as errors, never as hangs
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test engine_contract
//!
//! # Run lifecycle tests only
//! cargo test --test engine_contract lifecycle::
//! ```

use switchyard::{Engine, HandlerKey, Result, StateKey};

// Test modules
pub mod atomic_batch;
pub mod errors;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route engine logs through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A stopped engine with one partition of numbers and a handler appending to it.
///
/// The handler replies with the partition length after the append.
pub fn numbers_engine(engine: Engine) -> (Engine, StateKey<Vec<i32>>, HandlerKey<i32, usize>) {
    let (nums, push) = engine.register(Vec::new(), |eng: &Engine, sk, n: i32| {
        eng.update(sk, |v: &mut Vec<i32>| {
            v.push(n);
            v.len()
        })
    });
    (engine, nums, push)
}

/// A running default engine with the append handler registered.
pub fn running_numbers_engine() -> (Engine, StateKey<Vec<i32>>, HandlerKey<i32, usize>) {
    init_tracing();
    let (engine, nums, push) = numbers_engine(Engine::new());
    engine.run().expect("engine should start");
    (engine, nums, push)
}

/// Stateless handler returning its input plus one.
pub fn register_increment(engine: &Engine) -> HandlerKey<i64, i64> {
    let (_, increment) = engine.register((), |_: &Engine, _, n: i64| -> Result<i64> { Ok(n + 1) });
    increment
}
