//! Fetch-backed transport for `wasm32-unknown-unknown`.
//!
//! reqwest delegates to the browser's `fetch()` API when compiled to
//! WebAssembly. That platform has no threads and no blocking sockets, so
//! this backend exposes the execute contract as an async method; the
//! dispatcher and lazy-response layers stay on native targets.

mod fetch_impl;

pub use fetch_impl::{AsyncTransport, FetchTransport};
