use std::sync::Mutex;

use chatter_core::{
    Error, HttpRequest, HttpResponse, Method, Protocol, Result, Transport, TransportConfig,
};

/// Default blocking transport backed by ureq.
///
/// Plain HTTP/1.1 over blocking sockets, no async runtime. Redirects are
/// never followed; a 3xx comes back to the caller as-is.
pub struct UreqTransport {
    agent: ureq::Agent,
    last_protocol: Mutex<Option<Protocol>>,
}

impl UreqTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            // A 3xx is handed back to the caller, not an error and not
            // followed.
            .max_redirects(0)
            .max_redirects_will_error(false)
            // ureq defaults to a small idle pool; sizing it from the config
            // keeps keep-alive reuse in step with however many dispatcher
            // workers share this instance.
            .max_idle_connections(config.max_idle_connections)
            .max_idle_connections_per_host(config.max_idle_connections)
            .timeout_connect(config.connect_timeout)
            .timeout_global(config.read_timeout);
        if let Some(proxy) = &config.proxy {
            let proxy = ureq::Proxy::new(proxy)
                .map_err(|e| Error::Configuration(format!("invalid proxy `{proxy}`: {e}")))?;
            builder = builder.proxy(Some(proxy));
        }
        Ok(Self {
            agent: builder.build().into(),
            last_protocol: Mutex::new(None),
        })
    }
}

impl Transport for UreqTransport {
    fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let url = request.effective_url();
        let body = request.encode_body()?;

        let result = match request.method() {
            Method::Get | Method::Head | Method::Delete => {
                let mut req = match request.method() {
                    Method::Get => self.agent.get(url.as_str()),
                    Method::Head => self.agent.head(url.as_str()),
                    _ => self.agent.delete(url.as_str()),
                };
                for (name, value) in request.headers() {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.call()
            }
            Method::Post | Method::Put => {
                let mut req = match request.method() {
                    Method::Post => self.agent.post(url.as_str()),
                    _ => self.agent.put(url.as_str()),
                };
                for (name, value) in request.headers() {
                    req = req.header(name.as_str(), value.as_str());
                }
                match &body {
                    Some((content_type, bytes)) => req
                        .header("Content-Type", content_type.as_str())
                        .send(&bytes[..]),
                    None => req.send(&[][..]),
                }
            }
        };

        let response = result.map_err(Error::transport)?;
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
        let body = response
            .into_body()
            .read_to_vec()
            .map_err(Error::transport)?;
        Ok(HttpResponse::new(status, headers, body))
    }

    fn negotiated_protocol(&self) -> Option<Protocol> {
        *self.last_protocol.lock().expect("protocol lock poisoned")
    }
}

fn protocol_of(version: ureq::http::Version) -> Option<Protocol> {
    if version == ureq::http::Version::HTTP_11 {
        Some(Protocol::Http11)
    } else if version == ureq::http::Version::HTTP_2 {
        Some(Protocol::Http2)
    } else {
        None
    }
}
