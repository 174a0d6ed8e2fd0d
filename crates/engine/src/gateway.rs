//! Request/response gateway
//!
//! Every call builds a [`Request`] with its own single-slot reply conduit and
//! hands it to the dispatch loop. The variants differ only in what happens to
//! the receiving end:
//!
//! | Call | Receiving end |
//! |------|---------------|
//! | [`Engine::act`] | waited on until the reply or the conduit closes |
//! | [`Engine::act_timeout`] | waited on until a deadline, then dropped |
//! | [`Engine::act_async`] | dropped immediately |
//! | [`Engine::submit`] | returned to the caller as a [`Pending`] |
//!
//! A dropped receiver never stalls the loop: the reply is discarded on
//! delivery and both conduit ends are released.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, TryRecvError};
use switchyard_core::{Error, HandlerId, HandlerKey, Payload, Result};
use tracing::trace;

use crate::dispatch::{self, ReplyReceiver, Request};
use crate::Engine;

/// A submitted request whose reply has not been collected yet.
///
/// Dropping a `Pending` abandons the reply; the handler still runs.
pub struct Pending<O> {
    handler: HandlerId,
    reply: ReplyReceiver,
    _marker: PhantomData<fn() -> O>,
}

impl<O: 'static> Pending<O> {
    fn new(handler: HandlerId, reply: ReplyReceiver) -> Self {
        Pending {
            handler,
            reply,
            _marker: PhantomData,
        }
    }

    /// The handler this request was sent to.
    pub fn handler(&self) -> HandlerId {
        self.handler
    }

    /// Block until the reply arrives.
    ///
    /// Returns [`Error::NoResponse`] if the conduit closes without a reply.
    pub fn wait(self) -> Result<O> {
        match self.reply.rx.recv() {
            Ok(reply) => decode(reply),
            Err(_) => Err(Error::NoResponse(self.handler)),
        }
    }

    /// Block until the reply arrives or `timeout` elapses.
    ///
    /// On [`Error::Timeout`] the request stays pending and may be waited on
    /// again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<O> {
        match self.reply.rx.recv_timeout(timeout) {
            Ok(reply) => decode(reply),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::NoResponse(self.handler)),
        }
    }

    /// Collect the reply if it is already there.
    pub fn try_wait(&mut self) -> Option<Result<O>> {
        match self.reply.rx.try_recv() {
            Ok(reply) => Some(decode(reply)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::NoResponse(self.handler))),
        }
    }
}

impl<O> fmt::Debug for Pending<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("handler", &self.handler)
            .finish()
    }
}

fn decode<O: 'static>(reply: Result<Payload>) -> Result<O> {
    reply.and_then(Payload::downcast::<O>)
}

impl Engine {
    /// Call a handler and wait for its result.
    ///
    /// Blocks while the inbound queue has no room (by default until the loop
    /// takes the request), then until the reply arrives. Fails with
    /// [`Error::NoResponse`] rather than blocking forever if the loop stops
    /// without answering.
    pub fn act<I, O>(&self, key: HandlerKey<I, O>, input: I) -> Result<O>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        self.submit(key, input)?.wait()
    }

    /// Call a handler without waiting for its result.
    ///
    /// Returns once the loop has accepted the request. The reply is
    /// discarded when the handler finishes.
    pub fn act_async<I, O>(&self, key: HandlerKey<I, O>, input: I) -> Result<()>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let pending = self.submit(key, input)?;
        drop(pending);
        Ok(())
    }

    /// Submit a request and return a handle to its reply.
    pub fn submit<I, O>(&self, key: HandlerKey<I, O>, input: I) -> Result<Pending<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let (request, reply) = self.prepare(key.id(), Payload::new(input))?;
        let inbox = self.inbox()?;
        inbox.send(request).map_err(|_| Error::EngineStopped)?;
        self.accepted(key.id());
        Ok(Pending::new(key.id(), reply))
    }

    /// Call a handler, giving up after `timeout`.
    ///
    /// The deadline covers both queueing and waiting. A request that was
    /// accepted before the deadline cannot be withdrawn: the handler still
    /// runs and its reply is discarded. A timeout too large to express as an
    /// instant waits without a deadline, like [`Engine::act`].
    pub fn act_timeout<I, O>(&self, key: HandlerKey<I, O>, input: I, timeout: Duration) -> Result<O>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.act(key, input);
        };
        let (request, reply) = self.prepare(key.id(), Payload::new(input))?;
        let inbox = self.inbox()?;
        match inbox.send_timeout(request, timeout) {
            Ok(()) => self.accepted(key.id()),
            Err(SendTimeoutError::Timeout(_)) => return Err(Error::Timeout(timeout)),
            Err(SendTimeoutError::Disconnected(_)) => return Err(Error::EngineStopped),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let mut pending = Pending::new(key.id(), reply);
        match pending.wait_timeout(remaining) {
            Err(Error::Timeout(_)) => Err(Error::Timeout(timeout)),
            other => other,
        }
    }

    /// Build a request and its conduit, refusing calls from the loop itself.
    fn prepare(&self, handler: HandlerId, payload: Payload) -> Result<(Request, ReplyReceiver)> {
        if dispatch::on_dispatch_thread(&self.inner) {
            return Err(Error::Reentrant(handler));
        }
        let (sender, reply) = dispatch::conduit(&self.inner.counters.open_conduits);
        let request = Request {
            handler,
            payload,
            reply: sender,
        };
        Ok((request, reply))
    }

    /// Clone the producer side of the inbound queue.
    ///
    /// The clone is taken under a short read lock so that a blocking send
    /// never holds up [`Engine::shutdown`].
    fn inbox(&self) -> Result<crossbeam_channel::Sender<Request>> {
        self.inner
            .inbox
            .read()
            .as_ref()
            .cloned()
            .ok_or(Error::EngineStopped)
    }

    fn accepted(&self, handler: HandlerId) {
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        trace!(handler = %handler, "request accepted");
    }
}
