use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};

use crate::error::{Error, Result};
use crate::response::HttpResponse;

/// Receiving side of an exchange running on a dispatcher worker.
///
/// The worker sends exactly one outcome through the channel; the cancel flag
/// is read by the worker before it starts executing.
pub(crate) struct PendingExchange {
    receiver: mpsc::Receiver<std::result::Result<HttpResponse, Error>>,
    cancel: Arc<AtomicBool>,
}

enum State {
    Pending(PendingExchange),
    Resolving,
    Resolved(std::result::Result<HttpResponse, Arc<Error>>),
    Cancelled,
}

/// Observable lifecycle state of a [`LazyResponse`], for diagnostics and
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    Pending,
    Resolving,
    Resolved,
    Cancelled,
}

/// A response whose status, headers and body are materialized on first
/// access.
///
/// Backed either by an already-completed exchange (the synchronous path) or
/// by one still running on a dispatcher worker. The first accessor call
/// blocks until the exchange finishes and memoizes the outcome; concurrent
/// accessors wait on the same resolution instead of triggering a second one.
/// Once resolved or cancelled the state is terminal.
pub struct LazyResponse {
    state: Mutex<State>,
    resolved: Condvar,
}

impl LazyResponse {
    /// Wrap an already-completed response. Accessors never block.
    pub fn from_response(response: HttpResponse) -> Self {
        Self {
            state: Mutex::new(State::Resolved(Ok(response))),
            resolved: Condvar::new(),
        }
    }

    pub(crate) fn pending(
        receiver: mpsc::Receiver<std::result::Result<HttpResponse, Error>>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state: Mutex::new(State::Pending(PendingExchange { receiver, cancel })),
            resolved: Condvar::new(),
        }
    }

    pub fn state(&self) -> LazyState {
        match &*self.state.lock().expect("lazy response lock poisoned") {
            State::Pending(_) => LazyState::Pending,
            State::Resolving => LazyState::Resolving,
            State::Resolved(_) => LazyState::Resolved,
            State::Cancelled => LazyState::Cancelled,
        }
    }

    pub fn status(&self) -> Result<u16> {
        self.with_resolved(|response| response.status())
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Result<Option<String>> {
        self.with_resolved(|response| response.header(name).map(str::to_owned))
    }

    pub fn headers(&self) -> Result<Vec<(String, String)>> {
        self.with_resolved(|response| response.headers().to_vec())
    }

    pub fn body(&self) -> Result<Vec<u8>> {
        self.with_resolved(|response| response.body().to_vec())
    }

    pub fn text(&self) -> Result<String> {
        self.with_resolved(|response| response.text().map(str::to_owned))?
    }

    /// Generic structured view of the body.
    pub fn json(&self) -> Result<serde_json::Value> {
        self.with_resolved(|response| response.json())?
    }

    /// Abandon a response nobody consumed.
    ///
    /// Before resolution this transitions to the terminal `Cancelled` state
    /// and raises the cancel flag on the pending exchange; a worker that has
    /// not started yet skips execution, one already past that point delivers
    /// into a closed channel. Cancellation is best-effort, never a delivery
    /// guarantee. After resolution has begun or finished this is a no-op.
    pub fn disconnect(&self) {
        let mut state = self.state.lock().expect("lazy response lock poisoned");
        if let State::Pending(exchange) = &*state {
            exchange.cancel.store(true, Ordering::Relaxed);
            *state = State::Cancelled;
        }
    }

    /// Resolve if needed, then run `f` against the materialized response.
    ///
    /// Resolution happens at most once: the thread that finds the state
    /// `Pending` takes the exchange, flips to `Resolving` and blocks on the
    /// worker outcome outside the lock; everyone else waits on the condvar.
    fn with_resolved<R>(&self, f: impl FnOnce(&HttpResponse) -> R) -> Result<R> {
        let mut state = self.state.lock().expect("lazy response lock poisoned");
        loop {
            match &*state {
                State::Resolved(_) | State::Cancelled => break,
                State::Resolving => {
                    state = self
                        .resolved
                        .wait(state)
                        .expect("lazy response lock poisoned");
                }
                State::Pending(_) => {
                    let State::Pending(exchange) =
                        std::mem::replace(&mut *state, State::Resolving)
                    else {
                        unreachable!()
                    };
                    drop(state);
                    let outcome = match exchange.receiver.recv() {
                        Ok(Ok(response)) => Ok(response),
                        Ok(Err(err)) => Err(Arc::new(err)),
                        // Worker side dropped without delivering: the queue
                        // was torn down during shutdown.
                        Err(_) => Err(Arc::new(Error::Abandoned)),
                    };
                    state = self.state.lock().expect("lazy response lock poisoned");
                    *state = State::Resolved(outcome);
                    self.resolved.notify_all();
                }
            }
        }
        match &*state {
            State::Resolved(Ok(response)) => Ok(f(response)),
            State::Resolved(Err(cause)) => Err(Error::Deferred(Arc::clone(cause))),
            State::Cancelled => Err(Error::Disconnected),
            State::Pending(_) | State::Resolving => unreachable!(),
        }
    }
}

impl fmt::Debug for LazyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyResponse")
            .field("state", &self.state())
            .finish()
    }
}
