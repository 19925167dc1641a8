use std::fmt;
use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use url::{form_urlencoded, Url};

use crate::error::{Error, Result};

/// HTTP method of a request.
///
/// `Get` and `Head` are the read variants; everything else mutates remote
/// state. Only `Post` and `Put` carry a request body, so parameters attached
/// to the other methods are sent as query-string pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether parameters are carried in the request body rather than the
    /// query string.
    pub fn takes_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum PayloadContent {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

/// Upload payload attached to a request, sent as the file part of a
/// multipart/form-data body.
pub struct Payload {
    name: String,
    file_name: String,
    content_type: String,
    content: PayloadContent,
}

impl Payload {
    pub fn from_bytes(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            content: PayloadContent::Bytes(bytes),
        }
    }

    /// Streamed payload. The reader is drained into memory when the request
    /// body is encoded, immediately before the request is sent.
    pub fn from_reader(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            content: PayloadContent::Stream(Box::new(reader)),
        }
    }

    fn into_bytes(self) -> Result<(String, String, String, Vec<u8>)> {
        let bytes = match self.content {
            PayloadContent::Bytes(bytes) => bytes,
            PayloadContent::Stream(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).map_err(Error::transport)?;
                bytes
            }
        };
        Ok((self.name, self.file_name, self.content_type, bytes))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("name", &self.name)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// A single HTTP request, built by the caller and consumed exactly once by a
/// transport.
///
/// Parameters keep their insertion order both in query strings and in
/// encoded bodies. Authorization data, when any, arrives as ready-made
/// headers; this layer never computes signatures.
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    payload: Option<Payload>,
}

impl HttpRequest {
    pub fn new(method: Method, url: &str) -> Result<Self> {
        Ok(Self {
            method,
            url: Url::parse(url)?,
            params: Vec::new(),
            headers: Vec::new(),
            payload: None,
        })
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::Post, url)
    }

    /// Append a parameter. Order is preserved on the wire.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Append an extra header, e.g. a precomputed `Authorization` value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Request URL with parameters appended to the query string for methods
    /// that do not carry them in the body.
    pub fn effective_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.method.takes_body() && !self.params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }

    /// Encode the request body, returning its content type and bytes.
    ///
    /// A request with a payload becomes multipart/form-data with every
    /// parameter as a form-data part; a body-carrying method with plain
    /// parameters becomes a url-encoded form. Read methods without payload
    /// have no body. Consumes the payload, so call at most once.
    pub fn encode_body(&mut self) -> Result<Option<(String, Vec<u8>)>> {
        if let Some(payload) = self.payload.take() {
            return Ok(Some(self.encode_multipart(payload)?));
        }
        if self.method.takes_body() && !self.params.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            return Ok(Some((
                "application/x-www-form-urlencoded".to_string(),
                encoded.into_bytes(),
            )));
        }
        Ok(None)
    }

    fn encode_multipart(&self, payload: Payload) -> Result<(String, Vec<u8>)> {
        let boundary = multipart_boundary();
        let mut body = Vec::new();
        for (name, value) in &self.params {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        let (name, file_name, content_type, bytes) = payload.into_bytes()?;
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok((format!("multipart/form-data; boundary={boundary}"), body))
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("----chatter{nanos:x}")
}
