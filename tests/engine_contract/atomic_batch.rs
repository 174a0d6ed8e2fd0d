//! Atomic Batch Tests
//!
//! Writes made through a held [`switchyard::StateGuard`] become visible only
//! as a whole.

use crate::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A handler flips a flag to 1 and back under the guard, 100 times, while a
/// reader polls. The reader never sees anything but the settled value.
#[test]
fn test_guarded_flip_is_invisible_to_readers() {
    init_tracing();
    let engine = Engine::new();
    let (flag, flip) = engine.register(0u8, |eng: &Engine, sk, (): ()| {
        let mut guard = eng.lock();
        guard.set(sk, 1)?;
        thread::sleep(Duration::from_micros(200));
        guard.set(sk, 0)?;
        guard.unlock();
        Ok(())
    });
    engine.run().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));
    let reader = {
        let engine = engine.clone();
        let done = Arc::clone(&done);
        let reads = Arc::clone(&reads);
        thread::spawn(move || {
            loop {
                let seen = engine.get(flag).unwrap();
                assert!(seen <= 1, "value outside the batch: {}", seen);
                assert_eq!(seen, 0, "observed the middle of a batch");
                reads.fetch_add(1, Ordering::Relaxed);
                if done.load(Ordering::Acquire) {
                    break;
                }
            }
        })
    };

    for _ in 0..100 {
        engine.act(flip, ()).unwrap();
    }
    done.store(true, Ordering::Release);
    reader.join().unwrap();

    assert!(reads.load(Ordering::Relaxed) > 0);
    assert_eq!(engine.get(flag).unwrap(), 0);
    engine.shutdown();
}

/// A batch spanning two partitions is observed as a whole
#[test]
fn test_guard_spans_partitions() {
    init_tracing();
    let engine = Engine::new();
    let debit = engine.allocate(100i64);
    let credit = engine.allocate(0i64);
    let (_, transfer) = engine.register((), move |eng: &Engine, _, amount: i64| {
        let mut guard = eng.lock();
        guard.update(debit, |d| *d -= amount)?;
        guard.update(credit, |c| *c += amount)?;
        guard.unlock();
        Ok(())
    });
    engine.run().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let auditor = {
        let engine = engine.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let guard = engine.lock();
                let total = guard.get(debit).unwrap() + guard.get(credit).unwrap();
                guard.unlock();
                assert_eq!(total, 100);
            }
        })
    };

    for _ in 0..50 {
        engine.act(transfer, 1).unwrap();
    }
    done.store(true, Ordering::Release);
    auditor.join().unwrap();

    assert_eq!(engine.get(debit).unwrap(), 50);
    assert_eq!(engine.get(credit).unwrap(), 50);
    engine.shutdown();
}

/// Dropping the guard releases the lock just like `unlock`
#[test]
fn test_dropped_guard_releases_lock() {
    let engine = Engine::new();
    let key = engine.allocate(1u32);
    {
        let mut guard = engine.lock();
        guard.set(key, 2).unwrap();
    }
    engine.set(key, 3).unwrap();
    assert_eq!(engine.get(key).unwrap(), 3);
}
