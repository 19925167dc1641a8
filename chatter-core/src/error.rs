use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure: connection refused, timeout, TLS handshake,
    /// malformed response. Always wraps the underlying cause and never
    /// carries an HTTP status.
    #[error("transport: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Caller misconfiguration detected while setting up a connection,
    /// e.g. a malformed proxy URL. Distinct from network failures.
    #[error("configuration: {0}")]
    Configuration(String),

    /// The response was disconnected before it was resolved.
    #[error("response was already disconnected")]
    Disconnected,

    /// The dispatcher no longer accepts work.
    #[error("dispatcher has been shut down")]
    DispatcherShutDown,

    /// A queued request was dropped before a worker could run it.
    #[error("request was abandoned before completion")]
    Abandoned,

    /// A dispatched task body panicked. Routed to the task's own failure
    /// callback; the worker thread keeps running.
    #[error("dispatched task panicked: {0}")]
    TaskPanic(String),

    /// Cached failure of a deferred exchange, re-reported identically on
    /// every access to the response that owns it.
    #[error("deferred request failed: {0}")]
    Deferred(Arc<Error>),

    #[error("failed to spawn dispatcher worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("response body is not valid UTF-8: {0}")]
    BodyEncoding(#[from] std::str::Utf8Error),

    /// The body is not well-formed JSON. Distinct from transport errors:
    /// the exchange itself completed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an arbitrary backend failure as a transport error.
    pub fn transport<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(source))
    }
}
