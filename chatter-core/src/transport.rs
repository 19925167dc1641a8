use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Wire protocols a backend can offer during connection setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http11,
    Http2,
    Spdy31,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http11 => "http/1.1",
            Protocol::Http2 => "h2",
            Protocol::Spdy31 => "spdy/3.1",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interchangeable backend capable of executing one request.
///
/// Implementations may pool connections across calls, so a single instance
/// is meant to be reused for the lifetime of a client rather than
/// reconstructed per request. A completed exchange is a successful outcome
/// regardless of its status code; status-based policy belongs upstream.
pub trait Transport: Send + Sync {
    /// Execute the request and return the completed response.
    ///
    /// Fails with [`crate::Error::Transport`] on network-level trouble and
    /// [`crate::Error::Configuration`] on caller misconfiguration; never
    /// follows redirects on the caller's behalf.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Wire protocol of the most recent exchange, when the backend reports
    /// it. Diagnostic only.
    fn negotiated_protocol(&self) -> Option<Protocol> {
        None
    }
}

/// Construction-time settings for a transport instance.
///
/// Read once when the backend is built; reconfiguring means building a new
/// instance. Protocol preferences are per-instance fields on purpose, so
/// tests inject distinct configurations instead of mutating process state.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    /// Idle connections the pool may retain per host.
    pub max_idle_connections: usize,
    /// How long an idle pooled connection is kept alive.
    pub keep_alive: Duration,
    /// Offer the modern multiplexed protocol (HTTP/2) first.
    pub prefer_http2: bool,
    /// Append the legacy multiplexed protocol (SPDY/3.1) to the offer list.
    pub prefer_spdy: bool,
    /// Proxy URL, validated when the transport is constructed.
    pub proxy: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: Some(Duration::from_secs(30)),
            max_idle_connections: 16,
            keep_alive: Duration::from_secs(60),
            prefer_http2: true,
            prefer_spdy: false,
            proxy: None,
        }
    }
}

impl TransportConfig {
    /// Ordered protocol-offer list presented at connection setup.
    ///
    /// HTTP/1.1 is always offered as the fallback. Already-open pooled
    /// connections keep whatever they negotiated; the list only shapes new
    /// connections.
    pub fn protocol_offers(&self) -> Vec<Protocol> {
        let mut offers = Vec::with_capacity(3);
        if self.prefer_http2 {
            offers.push(Protocol::Http2);
        }
        if self.prefer_spdy {
            offers.push(Protocol::Spdy31);
        }
        offers.push(Protocol::Http11);
        offers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(prefer_http2: bool, prefer_spdy: bool) -> TransportConfig {
        TransportConfig {
            prefer_http2,
            prefer_spdy,
            ..TransportConfig::default()
        }
    }

    #[test]
    fn http11_is_always_the_fallback_offer() {
        assert_eq!(config(false, false).protocol_offers(), vec![Protocol::Http11]);
    }

    #[test]
    fn http2_is_offered_first_when_preferred() {
        assert_eq!(
            config(true, false).protocol_offers(),
            vec![Protocol::Http2, Protocol::Http11]
        );
    }

    #[test]
    fn spdy_is_appended_when_preferred() {
        assert_eq!(
            config(true, true).protocol_offers(),
            vec![Protocol::Http2, Protocol::Spdy31, Protocol::Http11]
        );
        assert_eq!(
            config(false, true).protocol_offers(),
            vec![Protocol::Spdy31, Protocol::Http11]
        );
    }
}
