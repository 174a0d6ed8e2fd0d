//! Error Path Tests
//!
//! Failures surface as [`Error`] values; none of them stops the loop.

use crate::*;
use std::thread;
use std::time::Duration;
use switchyard::{Error, HandlerId};

#[derive(Debug, thiserror::Error)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
struct Overdrawn {
    balance: u64,
    requested: u64,
}

fn account_engine() -> (Engine, StateKey<u64>, HandlerKey<u64, u64>) {
    init_tracing();
    let engine = Engine::new();
    let (balance, withdraw) = engine.register(100u64, |eng: &Engine, sk, amount: u64| {
        eng.update(sk, |balance| {
            if amount > *balance {
                return Err(Error::handler(Overdrawn {
                    balance: *balance,
                    requested: amount,
                }));
            }
            *balance -= amount;
            Ok(*balance)
        })?
    });
    engine.run().unwrap();
    (engine, balance, withdraw)
}

#[test]
fn test_unknown_handler() {
    let (engine, _, push) = running_numbers_engine();
    let ghost: HandlerKey<i32, usize> = HandlerKey::from_raw(HandlerId(99));

    match engine.act(ghost, 1) {
        Err(Error::UnknownHandler(id)) => assert_eq!(id, HandlerId(99)),
        other => panic!("expected UnknownHandler, got {:?}", other),
    }

    // The loop keeps serving
    assert_eq!(engine.act(push, 1).unwrap(), 1);
    assert_eq!(engine.stats().failed, 1);
    engine.shutdown();
}

#[test]
fn test_handler_error_passes_through() {
    let (engine, balance, withdraw) = account_engine();

    assert_eq!(engine.act(withdraw, 30).unwrap(), 70);

    let err = engine.act(withdraw, 500).unwrap_err();
    assert!(err.is_handler_error());
    let source = err.handler_source().unwrap();
    let overdrawn = source.downcast_ref::<Overdrawn>().unwrap();
    assert_eq!(overdrawn.balance, 70);
    assert_eq!(overdrawn.requested, 500);

    // A failed request leaves the partition as it was
    assert_eq!(engine.get(balance).unwrap(), 70);
    assert_eq!(engine.act(withdraw, 70).unwrap(), 0);
    engine.shutdown();
}

#[test]
fn test_panicking_handler_yields_no_response() {
    init_tracing();
    let engine = Engine::new();
    let (_, fragile) = engine.register((), |_: &Engine, _, n: u32| -> Result<u32> {
        if n == 13 {
            panic!("unlucky number");
        }
        Ok(n)
    });
    engine.run().unwrap();

    match engine.act(fragile, 13) {
        Err(Error::NoResponse(id)) => assert_eq!(id, fragile.id()),
        other => panic!("expected NoResponse, got {:?}", other),
    }

    // The loop survived the panic
    assert_eq!(engine.act(fragile, 7).unwrap(), 7);
    let stats = engine.stats();
    assert_eq!(stats.panicked, 1);
    assert!(stats.running);
    engine.shutdown();
}

#[test]
fn test_act_after_shutdown() {
    let (engine, nums, push) = running_numbers_engine();
    engine.act(push, 1).unwrap();
    engine.shutdown();

    assert!(engine.act(push, 2).unwrap_err().is_stopped());
    assert!(engine.act_async(push, 3).unwrap_err().is_stopped());
    assert!(matches!(engine.submit(push, 4), Err(Error::EngineStopped)));

    // State stays readable after the loop is gone
    assert_eq!(engine.get(nums).unwrap(), vec![1]);
}

#[test]
fn test_act_timeout_on_slow_handler() {
    init_tracing();
    let engine = Engine::new();
    let (done, slow) = engine.register(false, |eng: &Engine, sk, pause: Duration| {
        thread::sleep(pause);
        eng.set(sk, true)
    });
    engine.run().unwrap();

    let err = engine
        .act_timeout(slow, Duration::from_millis(200), Duration::from_millis(20))
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(20)));

    // The request was not withdrawn: shutdown drains it and the handler ran
    engine.shutdown();
    assert!(engine.get(done).unwrap());
    assert_eq!(engine.stats().open_conduits, 0);
}

#[test]
fn test_act_timeout_fast_handler_replies() {
    let (engine, _, push) = running_numbers_engine();
    let len = engine.act_timeout(push, 5, Duration::from_secs(5)).unwrap();
    assert_eq!(len, 1);
    engine.shutdown();
}

#[test]
fn test_act_timeout_while_queue_is_full() {
    init_tracing();
    // Rendezvous queue and a loop that never starts: nothing can be accepted
    let (engine, _, push) = numbers_engine(Engine::new());

    let err = engine.act_timeout(push, 1, Duration::from_millis(10)).unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(engine.stats().submitted, 0);
    assert_eq!(engine.stats().open_conduits, 0);
}

#[test]
fn test_pending_wait_timeout_can_retry() {
    init_tracing();
    let engine = Engine::new();
    let (_, slow) = engine.register((), |_: &Engine, _, pause: Duration| -> Result<&'static str> {
        thread::sleep(pause);
        Ok("finally")
    });
    engine.run().unwrap();

    let mut pending = engine.submit(slow, Duration::from_millis(100)).unwrap();
    assert!(pending.wait_timeout(Duration::from_millis(1)).unwrap_err().is_timeout());
    assert_eq!(pending.wait_timeout(Duration::from_secs(10)).unwrap(), "finally");
    engine.shutdown();
}

#[test]
fn test_reentrant_act_fails_fast() {
    init_tracing();
    let engine = Engine::new();
    let increment = register_increment(&engine);
    let (_, nested) = engine.register((), move |eng: &Engine, _, n: i64| {
        let err = eng.act(increment, n).unwrap_err();
        let async_err = eng.act_async(increment, n).unwrap_err();
        Ok((err.to_string(), async_err.to_string()))
    });
    engine.run().unwrap();

    let (sync_msg, async_msg) = engine.act(nested, 1).unwrap();
    let expected = format!("reentrant call to handler {} from the dispatch thread", increment.id());
    assert_eq!(sync_msg, expected);
    assert_eq!(async_msg, expected);

    // Work handed to another thread may call back into the engine
    let (_, offload) = engine.register((), move |eng: &Engine, _, n: i64| {
        let eng = eng.clone();
        Ok(thread::spawn(move || eng.act(increment, n)))
    });
    let worker = engine.act(offload, 1).unwrap();
    assert_eq!(worker.join().unwrap().unwrap(), 2);
    engine.shutdown();
}
