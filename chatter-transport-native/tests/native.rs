//! Socket-level tests for the native backends against a minimal in-process
//! HTTP/1.1 server. The server counts accepted connections so keep-alive
//! reuse is observable from the outside.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use chatter_core::{Error, HttpRequest, Payload, Protocol, Transport, TransportConfig};
use chatter_transport_native::UreqTransport;

struct Received {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Received {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

type Handler = Arc<dyn Fn(&Received) -> Vec<u8> + Send + Sync>;

struct MockServer {
    base_url: String,
    connections: Arc<AtomicUsize>,
}

fn spawn_server(handler: Handler) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            let handler = Arc::clone(&handler);
            thread::spawn(move || serve_connection(stream, handler));
        }
    });
    MockServer {
        base_url: format!("http://{addr}"),
        connections,
    }
}

fn serve_connection(mut stream: TcpStream, handler: Handler) {
    while let Some(request) = read_request(&mut stream) {
        let response = handler(&request);
        if stream.write_all(&response).is_err() {
            break;
        }
        let _ = stream.flush();
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Received> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
        if head.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    let head = String::from_utf8_lossy(&head).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let mut headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        stream.read_exact(&mut body).ok()?;
    }
    Some(Received {
        method,
        target,
        headers,
        body,
    })
}

fn response_with(status: u16, reason: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut bytes = format!("HTTP/1.1 {status} {reason}\r\n").into_bytes();
    for (name, value) in headers {
        bytes.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    bytes.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// Echoes the request line, the content type the server saw and the raw
/// body, so tests can assert on what actually hit the wire.
fn echo_handler() -> Handler {
    Arc::new(|request: &Received| {
        let mut body = format!(
            "{} {}\n{}\n",
            request.method,
            request.target,
            request.header("content-type").unwrap_or("-")
        )
        .into_bytes();
        body.extend_from_slice(&request.body);
        response_with(200, "OK", &[("Content-Type", "text/plain")], &body)
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn get_roundtrip_reports_http11() {
    let server = spawn_server(echo_handler());
    let transport = UreqTransport::new(&TransportConfig::default()).unwrap();

    let request = HttpRequest::get(&format!("{}/account/verify", server.base_url))
        .unwrap()
        .param("skip_status", "true")
        .header("Authorization", "Bearer xyz");
    let response = transport.execute(request).unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert!(response
        .text()
        .unwrap()
        .starts_with("GET /account/verify?skip_status=true"));
    assert_eq!(transport.negotiated_protocol(), Some(Protocol::Http11));
}

#[test]
fn post_form_body_reaches_the_server() {
    let server = spawn_server(echo_handler());
    let transport = UreqTransport::new(&TransportConfig::default()).unwrap();

    let request = HttpRequest::post(&format!("{}/statuses/update", server.base_url))
        .unwrap()
        .param("status", "hello world")
        .param("lang", "en");
    let response = transport.execute(request).unwrap();

    let text = response.text().unwrap().to_string();
    assert!(text.starts_with("POST /statuses/update"));
    assert!(text.contains("application/x-www-form-urlencoded"));
    assert!(text.contains("status=hello+world&lang=en"));
}

#[test]
fn multipart_payload_reaches_the_server_intact() {
    let server = spawn_server(echo_handler());
    let transport = UreqTransport::new(&TransportConfig::default()).unwrap();

    let request = HttpRequest::post(&format!("{}/media/upload", server.base_url))
        .unwrap()
        .param("description", "avatar")
        .payload(Payload::from_bytes(
            "media",
            "avatar.png",
            "image/png",
            b"PNGDATA".to_vec(),
        ));
    let response = transport.execute(request).unwrap();

    let body = response.body().to_vec();
    assert!(contains(&body, b"multipart/form-data; boundary="));
    assert!(contains(&body, b"name=\"description\"\r\n\r\navatar"));
    assert!(contains(&body, b"filename=\"avatar.png\""));
    assert!(contains(&body, b"PNGDATA"));
}

#[test]
fn sequential_requests_reuse_the_connection() {
    let server = spawn_server(echo_handler());
    let transport = UreqTransport::new(&TransportConfig::default()).unwrap();

    for _ in 0..2 {
        let request = HttpRequest::get(&format!("{}/timeline", server.base_url)).unwrap();
        assert_eq!(transport.execute(request).unwrap().status(), 200);
    }
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}

#[test]
fn redirects_are_returned_not_followed() {
    let handler: Handler = Arc::new(|_request: &Received| {
        response_with(301, "Moved Permanently", &[("Location", "http://example.com/moved")], b"")
    });
    let server = spawn_server(handler);
    let transport = UreqTransport::new(&TransportConfig::default()).unwrap();

    let request = HttpRequest::get(&format!("{}/old", server.base_url)).unwrap();
    let response = transport.execute(request).unwrap();

    assert_eq!(response.status(), 301);
    assert_eq!(response.header("location"), Some("http://example.com/moved"));
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}

#[test]
fn connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = UreqTransport::new(&TransportConfig::default()).unwrap();
    let request = HttpRequest::get(&format!("http://{addr}/gone")).unwrap();
    match transport.execute(request) {
        Err(Error::Transport(_)) => {}
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[cfg(feature = "reqwest-client")]
mod reqwest_backend {
    use super::*;
    use chatter_transport_native::ReqwestTransport;

    fn http1_config() -> TransportConfig {
        TransportConfig {
            prefer_http2: false,
            prefer_spdy: false,
            ..TransportConfig::default()
        }
    }

    #[test]
    fn negotiates_plain_http11_when_multiplexed_disabled() {
        let server = spawn_server(echo_handler());
        let transport = ReqwestTransport::new(&http1_config()).unwrap();
        assert_eq!(transport.protocol_offers(), &[Protocol::Http11]);

        let request = HttpRequest::get(&format!("{}/timeline", server.base_url)).unwrap();
        assert_eq!(transport.execute(request).unwrap().status(), 200);
        assert_eq!(transport.negotiated_protocol(), Some(Protocol::Http11));
    }

    #[test]
    fn pool_reuses_the_connection_across_requests() {
        let server = spawn_server(echo_handler());
        let transport = ReqwestTransport::new(&http1_config()).unwrap();

        for _ in 0..2 {
            let request = HttpRequest::get(&format!("{}/timeline", server.base_url)).unwrap();
            assert_eq!(transport.execute(request).unwrap().status(), 200);
        }
        assert_eq!(server.connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn structured_body_is_exposed_as_json() {
        let handler: Handler = Arc::new(|_request: &Received| {
            response_with(
                200,
                "OK",
                &[("Content-Type", "application/json")],
                br#"{"id": 7, "user": {"name": "ada"}}"#,
            )
        });
        let server = spawn_server(handler);
        let transport = ReqwestTransport::new(&http1_config()).unwrap();

        let request = HttpRequest::get(&format!("{}/statuses/7", server.base_url)).unwrap();
        let value = transport.execute(request).unwrap().json().unwrap();
        assert_eq!(value["id"], serde_json::json!(7));
        assert_eq!(value["user"]["name"], serde_json::json!("ada"));
    }

    #[test]
    fn malformed_proxy_is_a_configuration_error() {
        let config = TransportConfig {
            proxy: Some("not a proxy url".to_string()),
            ..TransportConfig::default()
        };
        match ReqwestTransport::new(&config) {
            Err(Error::Configuration(message)) => assert!(message.contains("proxy")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
