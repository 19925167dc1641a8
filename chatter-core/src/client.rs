use std::sync::Arc;

use crate::dispatcher::{DispatchTask, Dispatcher, DispatcherConfig};
use crate::error::{Error, Result};
use crate::lazy::LazyResponse;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::Transport;

/// Entry point tying a transport to a dispatcher.
///
/// Generic over the transport implementation so callers depend only on the
/// [`Transport`] contract. The transport is shared behind an `Arc` and
/// reused across requests, which is what makes connection pooling and
/// keep-alive effective.
pub struct ChatterClient<T: Transport + 'static> {
    transport: Arc<T>,
    dispatcher: Dispatcher,
}

impl<T: Transport + 'static> ChatterClient<T> {
    pub fn new(transport: T) -> Result<Self> {
        Self::with_config(transport, DispatcherConfig::default())
    }

    pub fn with_config(transport: T, config: DispatcherConfig) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(transport),
            dispatcher: Dispatcher::new(config)?,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute on the caller's thread. Never touches the worker pool.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.execute(request)
    }

    /// Schedule on the worker pool. The returned response blocks only when
    /// first inspected, so a caller can fire many requests and pay for the
    /// ones it reads.
    pub fn execute_async(&self, request: HttpRequest) -> Result<LazyResponse> {
        self.dispatcher.dispatch(Arc::clone(&self.transport), request)
    }

    /// Schedule on the worker pool with a completion callback, invoked
    /// exactly once with either the response or the failure.
    pub fn execute_with_callback(
        &self,
        request: HttpRequest,
        complete: impl FnOnce(std::result::Result<HttpResponse, Error>) + Send + 'static,
    ) -> Result<()> {
        let transport = Arc::clone(&self.transport);
        self.dispatcher
            .submit(DispatchTask::new(move || transport.execute(request), complete))
    }

    /// Stop the worker pool. The hosting application calls this (or wires
    /// it into its own exit hook) when it is done with the client; dropping
    /// the client performs it best-effort.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown()
    }
}
