//! Native [`Transport`](chatter_core::Transport) backends.
//!
//! Two implementations behind cargo features:
//! - `ureq-client`: minimal blocking socket client, plain HTTP/1.1.
//! - `reqwest-client`: pooling client with protocol negotiation.

#[cfg(not(any(feature = "ureq-client", feature = "reqwest-client")))]
compile_error!("Enable at least one of the `ureq-client` or `reqwest-client` features.");

#[cfg(feature = "ureq-client")]
mod ureq_impl;
#[cfg(feature = "reqwest-client")]
mod reqwest_impl;

#[cfg(feature = "ureq-client")]
pub use ureq_impl::UreqTransport;
#[cfg(feature = "reqwest-client")]
pub use reqwest_impl::ReqwestTransport;
