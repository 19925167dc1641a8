use std::sync::Mutex;

use chatter_core::{
    Error, HttpRequest, HttpResponse, Method, Protocol, Result, Transport, TransportConfig,
};

/// Pooling transport backed by reqwest's blocking client.
///
/// The connection pool bounds and keep-alive come from the config rather
/// than library defaults, so reuse behavior is explicit and testable. The
/// protocol-offer list is read once here, at construction: connections
/// opened later negotiate from that list, and pooled connections keep
/// whatever they already negotiated.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    offers: Vec<Protocol>,
    last_protocol: Mutex<Option<Protocol>>,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let offers = config.protocol_offers();
        if offers.contains(&Protocol::Spdy31) {
            // reqwest negotiates via ALPN and the registry no longer carries
            // spdy; the offer stays on record but cannot be honored.
            log::warn!("spdy/3.1 preferred in configuration but unsupported by this backend");
        }

        let mut builder = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.keep_alive);
        if !offers.contains(&Protocol::Http2) {
            builder = builder.http1_only();
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| Error::Configuration(format!("invalid proxy `{proxy}`: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build pooling client: {e}")))?;

        Ok(Self {
            client,
            offers,
            last_protocol: Mutex::new(None),
        })
    }

    /// Ordered protocol-offer list this instance was configured with.
    pub fn protocol_offers(&self) -> &[Protocol] {
        &self.offers
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let url = request.effective_url();
        let body = request.encode_body()?;
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut req = self.client.request(method, url.as_str());
        for (name, value) in request.headers() {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some((content_type, bytes)) = body {
            req = req.header("Content-Type", content_type.as_str()).body(bytes);
        }

        let response = req.send().map_err(map_error)?;
        *self.last_protocol.lock().expect("protocol lock poisoned") =
            protocol_of(response.version());

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().map_err(map_error)?.to_vec();
        Ok(HttpResponse::new(status, headers, body))
    }

    fn negotiated_protocol(&self) -> Option<Protocol> {
        *self.last_protocol.lock().expect("protocol lock poisoned")
    }
}

fn map_error(err: reqwest::Error) -> Error {
    if err.is_builder() {
        Error::Configuration(err.to_string())
    } else {
        Error::transport(err)
    }
}

fn protocol_of(version: reqwest::Version) -> Option<Protocol> {
    if version == reqwest::Version::HTTP_11 {
        Some(Protocol::Http11)
    } else if version == reqwest::Version::HTTP_2 {
        Some(Protocol::Http2)
    } else {
        None
    }
}
