//! Transport-agnostic core of the chatter client: request/response model,
//! lazy response resolution, bounded asynchronous dispatch and the transport
//! contract interchangeable backends implement.

mod client;
mod dispatcher;
mod error;
mod lazy;
mod request;
mod response;
mod transport;

pub use client::ChatterClient;
pub use dispatcher::{DispatchTask, Dispatcher, DispatcherConfig};
pub use error::{Error, Result};
pub use lazy::{LazyResponse, LazyState};
pub use request::{HttpRequest, Method, Payload};
pub use response::HttpResponse;
pub use transport::{Protocol, Transport, TransportConfig};
