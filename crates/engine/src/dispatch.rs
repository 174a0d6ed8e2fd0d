//! Dispatch loop
//!
//! The loop runs on one dedicated thread and is the only place handlers are
//! invoked. It takes requests strictly in arrival order, one at a time:
//!
//! ```text
//! 1. recv() next request (blocks while the queue is empty)
//! 2. upgrade the engine handle (exit if every Engine was dropped)
//! 3. resolve the handler       -> UnknownHandler if missing
//! 4. invoke under catch_unwind -> panic drops the reply (NoResponse)
//! 5. deliver onto the request's single-slot conduit
//! ```
//!
//! Delivery never blocks: every conduit has room for exactly one reply, and
//! a receiver that was already dropped turns delivery into a no-op.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use switchyard_core::{Error, HandlerId, Payload, Result};
use tracing::{debug, error, trace, warn};

use crate::engine::Shared;
use crate::Engine;

thread_local! {
    /// Address of the engine whose loop runs on this thread, 0 elsewhere.
    static DISPATCHING: Cell<usize> = const { Cell::new(0) };
}

/// Check whether the current thread is the dispatch thread of `shared`.
pub(crate) fn on_dispatch_thread(shared: &Arc<Shared>) -> bool {
    let addr = Arc::as_ptr(shared) as usize;
    DISPATCHING.with(|current| current.get() == addr)
}

/// Counts a request's conduit as open while either end is alive.
pub(crate) struct ConduitToken {
    open: Arc<AtomicUsize>,
}

impl ConduitToken {
    fn acquire(open: &Arc<AtomicUsize>) -> Arc<Self> {
        open.fetch_add(1, Ordering::SeqCst);
        Arc::new(ConduitToken {
            open: Arc::clone(open),
        })
    }
}

impl Drop for ConduitToken {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sending half of a request's reply conduit.
pub(crate) struct ReplySender {
    tx: Sender<Result<Payload>>,
    _token: Arc<ConduitToken>,
}

impl ReplySender {
    /// Hand the reply to the caller. Returns false if nobody is listening.
    ///
    /// The sender's share of the token is released before the reply becomes
    /// visible, so once the caller has its reply the conduit is accounted
    /// for by the receiving end alone.
    fn deliver(self, reply: Result<Payload>) -> bool {
        let ReplySender { tx, _token: token } = self;
        drop(token);
        tx.try_send(reply).is_ok()
    }
}

/// Receiving half of a request's reply conduit.
pub(crate) struct ReplyReceiver {
    pub(crate) rx: Receiver<Result<Payload>>,
    pub(crate) _token: Arc<ConduitToken>,
}

/// Create a fresh single-slot conduit, counted in `open`.
pub(crate) fn conduit(open: &Arc<AtomicUsize>) -> (ReplySender, ReplyReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let token = ConduitToken::acquire(open);
    (
        ReplySender {
            tx,
            _token: Arc::clone(&token),
        },
        ReplyReceiver { rx, _token: token },
    )
}

/// One call travelling to the dispatch loop.
pub(crate) struct Request {
    pub(crate) handler: HandlerId,
    pub(crate) payload: Payload,
    pub(crate) reply: ReplySender,
}

/// Body of the dispatch thread.
///
/// Holds only a weak reference between requests so that dropping every
/// [`Engine`] handle closes the inbound queue and ends the loop.
pub(crate) fn run_loop(shared: Weak<Shared>, inbox: Receiver<Request>) {
    DISPATCHING.with(|current| current.set(shared.as_ptr() as usize));
    debug!("dispatch loop started");

    for request in inbox.iter() {
        let Some(inner) = shared.upgrade() else {
            warn!(handler = %request.handler, "engine dropped with requests pending");
            break;
        };
        let engine = Engine { inner };
        serve(&engine, request);
    }

    DISPATCHING.with(|current| current.set(0));
    debug!("dispatch loop stopped");
}

/// Resolve, invoke and reply to one request.
fn serve(engine: &Engine, request: Request) {
    let Request {
        handler,
        payload,
        reply,
    } = request;
    let counters = &engine.inner.counters;

    let Some(target) = engine.inner.registry.get(handler) else {
        warn!(handler = %handler, "request for unknown handler");
        counters.failed.fetch_add(1, Ordering::Relaxed);
        reply.deliver(Err(Error::UnknownHandler(handler)));
        return;
    };

    trace!(handler = %handler, state = %target.state(), "dispatching");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| target.invoke(engine, payload)));
    counters.served.fetch_add(1, Ordering::Relaxed);

    match outcome {
        Ok(result) => {
            if result.is_err() {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            if !reply.deliver(result) {
                trace!(handler = %handler, "reply abandoned by caller");
            }
        }
        Err(cause) => {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                handler = %handler,
                panic = panic_message(cause.as_ref()),
                "handler panicked; dropping reply"
            );
            drop(reply);
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
