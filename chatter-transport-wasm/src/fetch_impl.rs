use async_trait::async_trait;

use chatter_core::{Error, HttpRequest, HttpResponse, Method, Result};

/// Async flavor of the transport contract for platforms without threads.
///
/// Same request-in, response-out semantics as
/// [`chatter_core::Transport`], minus the blocking call.
#[async_trait(?Send)]
pub trait AsyncTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by the platform fetch API.
///
/// The browser owns redirects, connection management and timeouts here;
/// the usual transport configuration does not apply.
#[derive(Clone)]
pub struct FetchTransport {
    client: reqwest::Client,
}

impl FetchTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for FetchTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl AsyncTransport for FetchTransport {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
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

        let response = req.send().await.map_err(Error::transport)?;
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
        let body = response.bytes().await.map_err(Error::transport)?.to_vec();
        Ok(HttpResponse::new(status, headers, body))
    }
}
