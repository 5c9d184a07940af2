//! HTTP client wrapper - executes requests and normalizes every result into
//! an [`Outcome`]

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::format::raw;
use crate::models::{Outcome, Request};
use crate::resolve::{resolve, EffectiveRequest};

/// Transport failure labels, checked in order against the lowercased error text
const FAILURE_LABELS: &[(&[&str], &str)] = &[
    (&["connection refused"], "Connection Refused"),
    (&["no such host", "no such domain"], "Host Not Found"),
    (&["timeout", "timed out"], "Request Timeout"),
    (&["eof"], "Connection Closed"),
    (&["certificate", "tls", "ssl"], "SSL/TLS Error"),
    (&["network"], "Network Error"),
    (&["dns"], "DNS Error"),
];

const FALLBACK_LABEL: &str = "Connection Failed";

/// Classify free-form transport error text into a status label
pub fn classify_error(message: &str) -> &'static str {
    let message = message.to_lowercase();
    FAILURE_LABELS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| message.contains(n)))
        .map(|(_, label)| *label)
        .unwrap_or(FALLBACK_LABEL)
}

/// Error text including every source in the chain
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let inner_text = inner.to_string();
        if !text.contains(&inner_text) {
            text.push_str(": ");
            text.push_str(&inner_text);
        }
        source = inner.source();
    }
    text
}

/// Status line in the `200 OK` form
fn status_line(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Multi-value headers are joined with ", "
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), joined)
        })
        .collect()
}

/// Header map with last-write-wins semantics over the resolved headers
fn transport_headers(effective: &EffectiveRequest) -> HeaderMap {
    let mut map = HeaderMap::new();
    for header in &effective.headers {
        let name = match HeaderName::from_bytes(header.name.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(header = %header.name, error = %e, "Skipping invalid header name");
                continue;
            }
        };
        match HeaderValue::from_str(&header.value) {
            Ok(value) => {
                map.insert(name, value);
            }
            Err(e) => {
                tracing::warn!(header = %header.name, error = %e, "Skipping invalid header value");
            }
        }
    }
    map
}

/// Build a request from the resolved parameters
fn build_request(
    client: &reqwest::Client,
    effective: &EffectiveRequest,
    timeout: Duration,
) -> Result<reqwest::RequestBuilder, String> {
    let method = if effective.method.is_empty() {
        reqwest::Method::GET
    } else {
        reqwest::Method::from_bytes(effective.method.as_bytes())
            .map_err(|e| format!("invalid method {:?}: {}", effective.method, e))?
    };

    let mut req_builder = client
        .request(method, effective.url.as_str())
        .headers(transport_headers(effective))
        .timeout(timeout);

    if !effective.body.is_empty() {
        req_builder = req_builder.body(effective.body.as_str().to_owned());
    }

    Ok(req_builder)
}

fn transport_failure(message: String, elapsed: u64, raw_request: String) -> Outcome {
    Outcome {
        status: 0,
        status_text: classify_error(&message).to_string(),
        headers: BTreeMap::new(),
        size: message.len() as u64,
        body: message,
        duration_ms: elapsed,
        raw_request,
    }
}

/// Executes resolved requests. Cheap to clone; clones share a connection pool.
#[derive(Clone, Debug)]
pub struct Executor {
    client: reqwest::Client,
}

impl Executor {
    pub fn new() -> Self {
        Executor {
            client: create_client(),
        }
    }

    /// Execute `request` under `timeout`. Never fails: transport and body-read
    /// failures are encoded in the returned [`Outcome`].
    pub async fn execute(&self, request: &Request, timeout: Duration) -> Outcome {
        let effective = resolve(request);
        let raw_request = raw::render(&effective);
        tracing::info!(url = %effective.url, method = %effective.method, "Executing request");

        let start = Instant::now();
        let sent = match build_request(&self.client, &effective, timeout) {
            Ok(builder) => builder
                .send()
                .await
                .map_err(|e| error_chain(&e.without_url())),
            Err(message) => Err(message),
        };

        let outcome = match sent {
            Err(message) => {
                let elapsed = start.elapsed().as_millis() as u64;
                transport_failure(message, elapsed, raw_request)
            }
            Ok(resp) => {
                let status = resp.status();
                let status_text = status_line(status);
                let headers = collect_headers(resp.headers());
                match resp.bytes().await {
                    Ok(bytes) => Outcome {
                        status: status.as_u16(),
                        status_text,
                        headers,
                        body: String::from_utf8_lossy(&bytes).into_owned(),
                        duration_ms: start.elapsed().as_millis() as u64,
                        size: bytes.len() as u64,
                        raw_request,
                    },
                    Err(e) => Outcome {
                        status: status.as_u16(),
                        status_text,
                        headers: BTreeMap::new(),
                        body: format!("Failed to read response body: {}", error_chain(&e)),
                        duration_ms: start.elapsed().as_millis() as u64,
                        size: 0,
                        raw_request,
                    },
                }
            }
        };

        tracing::info!(
            status = outcome.status,
            status_text = %outcome.status_text,
            duration_ms = outcome.duration_ms,
            "Request completed"
        );
        outcome
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Create an HTTP client with default configuration. Timeouts are applied
/// per request.
pub fn create_client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one connection: capture the request head, then write `response`
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            let head_end = loop {
                if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break received.len();
                }
                received.extend_from_slice(&buf[..n]);
            };
            let head = String::from_utf8_lossy(&received[..head_end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while received.len() < head_end + body_len {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(
            classify_error("tcp connect error: Connection refused (os error 111)"),
            "Connection Refused"
        );
        assert_eq!(classify_error("dial tcp: lookup foo: no such host"), "Host Not Found");
        assert_eq!(classify_error("operation timed out"), "Request Timeout");
        assert_eq!(classify_error("unexpected EOF"), "Connection Closed");
        assert_eq!(classify_error("invalid peer certificate: UnknownIssuer"), "SSL/TLS Error");
        assert_eq!(classify_error("network is unreachable"), "Network Error");
        assert_eq!(classify_error("dns error: failed to lookup address"), "DNS Error");
        assert_eq!(classify_error("something else"), "Connection Failed");
        // "timeout" outranks "tls"
        assert_eq!(classify_error("TLS handshake timeout"), "Request Timeout");
    }

    #[tokio::test]
    async fn test_connection_refused_outcome() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let req = Request::new("GET", format!("http://127.0.0.1:{}/ping", port));
        let outcome = Executor::new().execute(&req, Duration::from_secs(5)).await;

        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.status_text, "Connection Refused");
        assert!(outcome.headers.is_empty());
        assert_eq!(outcome.size, outcome.body.len() as u64);
        assert!(outcome.raw_request.starts_with("GET /ping HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_invalid_method_is_a_transport_failure() {
        let req = Request::new("GE T", "http://127.0.0.1:9/");
        let outcome = Executor::new().execute(&req, Duration::from_secs(1)).await;
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.status_text, "Connection Failed");
        assert!(outcome.body.contains("invalid method"));
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let (base, server) = serve_once(
            "HTTP/1.1 201 Created\r\nContent-Length: 5\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\nhello",
        )
        .await;
        let req = Request::new("POST", format!("{}/items", base))
            .with_query("q", "1")
            .with_bearer("xyz")
            .with_body("payload");
        let outcome = Executor::new().execute(&req, Duration::from_secs(5)).await;

        assert_eq!(outcome.status, 201);
        assert_eq!(outcome.status_text, "201 Created");
        assert_eq!(outcome.body, "hello");
        assert_eq!(outcome.size, 5);
        assert_eq!(outcome.headers.get("set-cookie").unwrap(), "a=1, b=2");
        assert!(outcome.raw_request.starts_with("POST /items?q=1 HTTP/1.1\r\n"));

        let received = server.await.unwrap().to_lowercase();
        assert!(received.starts_with("post /items?q=1 http/1.1\r\n"));
        assert!(received.contains("authorization: bearer xyz"));
        assert!(received.contains("user-agent: reqforge/"));
    }

    #[tokio::test]
    async fn test_derived_authorization_replaces_user_header_on_the_wire() {
        let (base, server) = serve_once("HTTP/1.1 204 No Content\r\n\r\n").await;
        let req = Request::new("GET", base)
            .with_header("Authorization", "Token old")
            .with_bearer("new");
        let outcome = Executor::new().execute(&req, Duration::from_secs(5)).await;
        assert_eq!(outcome.status, 204);

        let received = server.await.unwrap().to_lowercase();
        assert!(received.contains("authorization: bearer new"));
        assert!(!received.contains("token old"));
    }

    #[tokio::test]
    async fn test_truncated_body_is_a_read_failure() {
        let (base, _server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 100\r\nX-Test: yes\r\n\r\nshort").await;
        let outcome = Executor::new()
            .execute(&Request::new("GET", base), Duration::from_secs(5))
            .await;

        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.status_text, "200 OK");
        assert!(outcome.headers.is_empty());
        assert!(outcome.body.starts_with("Failed to read response body: "));
        assert_eq!(outcome.size, 0);
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        let req = Request::new("GET", format!("http://{}/slow", addr));
        let outcome = Executor::new().execute(&req, Duration::from_millis(200)).await;

        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.status_text, "Request Timeout");
    }
}
