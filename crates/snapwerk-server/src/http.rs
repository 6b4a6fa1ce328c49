// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 framing over raw tokio streams.
//
// Only what the service needs: one request per connection, bodies framed by
// Content-Length, `Expect: 100-continue` acknowledged, and every response
// closes the connection. Chunked request bodies are rejected.

use serde_json::json;
use sha2::{Digest, Sha256};
use snapwerk_core::error::{Result, SnapwerkError};
use snapwerk_core::human_errors::humanize_error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Read buffer growth step.
const READ_CHUNK: usize = 16 * 1024;

/// Upper bound on the request line plus headers.
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// `Retry-After` value sent with transient failures, in seconds.
const RETRY_AFTER_SECS: u32 = 1;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A fully received HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Decoded path without the query string.
    pub path: String,
    /// Decoded query parameters in request order.
    pub query: Vec<(String, String)>,
    /// Header names are kept as sent; lookups are case-insensitive.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First header named `name` (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Request line and headers, before the body arrives.
#[derive(Debug)]
struct RequestHead {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Read one request from `stream`.
///
/// Returns `Ok(None)` when the peer closes without sending anything.
/// Requests larger than `max_bytes` fail with `PayloadTooLarge` as soon as
/// the declared Content-Length (or the bytes received) exceed it.
pub async fn read_request<S>(stream: &mut S, max_bytes: usize) -> Result<Option<HttpRequest>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];

    // Headers.
    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES.min(max_bytes) {
            return Err(SnapwerkError::PayloadTooLarge { limit: max_bytes });
        }
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| SnapwerkError::Server(format!("read request head: {e}")))?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(SnapwerkError::InvalidRequest(
                "connection closed before the request headers ended".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head_text = std::str::from_utf8(&buf[..header_end])
        .map_err(|_| SnapwerkError::InvalidRequest("request headers are not valid UTF-8".into()))?;
    let head = parse_head(head_text)?;
    let body_offset = header_end + 4;

    if head
        .header("transfer-encoding")
        .is_some_and(|te| !te.trim().eq_ignore_ascii_case("identity"))
    {
        return Err(SnapwerkError::InvalidRequest(
            "chunked request bodies are not supported; send Content-Length".into(),
        ));
    }

    let content_length = match head.header("content-length") {
        Some(value) => value.trim().parse::<usize>().map_err(|_| {
            SnapwerkError::InvalidRequest(format!("invalid Content-Length: {value}"))
        })?,
        None => 0,
    };
    if body_offset.saturating_add(content_length) > max_bytes {
        return Err(SnapwerkError::PayloadTooLarge { limit: max_bytes });
    }

    if content_length > 0
        && head
            .header("expect")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"))
        && buf.len() == body_offset
    {
        stream
            .write_all(b"HTTP/1.1 100 Continue\r\n\r\n")
            .await
            .map_err(|e| SnapwerkError::Server(format!("write 100 Continue: {e}")))?;
    }

    // Body.
    let total = body_offset + content_length;
    while buf.len() < total {
        let want = (total - buf.len()).min(chunk.len());
        let n = stream
            .read(&mut chunk[..want])
            .await
            .map_err(|e| SnapwerkError::Server(format!("read request body: {e}")))?;
        if n == 0 {
            return Err(SnapwerkError::InvalidRequest(format!(
                "request body truncated: expected {content_length} bytes, got {}",
                buf.len() - body_offset
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    buf.truncate(total);
    let body = buf.split_off(body_offset);

    let (path, query) = split_target(&head.target);
    debug!(
        method = %head.method,
        path = %path,
        body_bytes = body.len(),
        "HTTP request received"
    );

    Ok(Some(HttpRequest {
        method: head.method,
        path,
        query,
        headers: head.headers,
        body,
    }))
}

/// Parse the request line and header block (without the final blank line).
fn parse_head(text: &str) -> Result<RequestHead> {
    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SnapwerkError::InvalidRequest(format!(
            "malformed request line: {request_line:?}"
        )));
    };
    if !version.starts_with("HTTP/") {
        return Err(SnapwerkError::InvalidRequest(format!(
            "unsupported protocol: {version}"
        )));
    }

    let mut headers = Vec::new();
    for line in lines.filter(|l| !l.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            SnapwerkError::InvalidRequest(format!("malformed header line: {line:?}"))
        })?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method: method.to_ascii_uppercase(),
        target: target.to_string(),
        headers,
    })
}

/// Split a request target into its decoded path and query pairs.
fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect();
    (percent_decode(path), pairs)
}

/// Decode `%XX` escapes and `+` (space). Invalid escapes are kept verbatim.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Find the first occurrence of `needle` in `haystack`.
pub(crate) fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A response ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    /// Extra headers beyond Content-Type, Content-Length, X-Content-Sha256
    /// and Connection.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string().into_bytes())
    }

    /// JSON error body `{"error": ..., "suggestion": ...}`.
    pub fn error(status: u16, message: &str, suggestion: &str) -> Self {
        Self::json(status, &json!({ "error": message, "suggestion": suggestion }))
    }

    /// Error response for `err`, with status and wording from the
    /// human-readable mapping.
    /// Error response for `err`. Transient failures carry `Retry-After`.
    pub fn from_error(err: &SnapwerkError) -> Self {
        let human = humanize_error(err);
        let response = Self::error(human.status, &human.message, &human.suggestion);
        if human.retriable() {
            response.with_header("Retry-After", RETRY_AFTER_SECS.to_string())
        } else {
            response
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Hex SHA-256 of the body, sent as `X-Content-Sha256`.
    pub fn body_sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.body))
    }
}

/// Reason phrase for the status codes the service emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Write `response` as a complete HTTP/1.1 message and flush.
pub async fn write_response<W>(stream: &mut W, response: &HttpResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         X-Content-Sha256: {}\r\n",
        response.status,
        reason_phrase(response.status),
        response.content_type,
        response.body.len(),
        response.body_sha256(),
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("Connection: close\r\n\r\n");

    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|e| SnapwerkError::Server(format!("write HTTP headers: {e}")))?;
    stream
        .write_all(&response.body)
        .await
        .map_err(|e| SnapwerkError::Server(format!("write HTTP body: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| SnapwerkError::Server(format!("flush: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn read_raw(raw: &[u8], max: usize) -> Result<Option<HttpRequest>> {
        let (mut client, mut server) = duplex(1 << 20);
        client.write_all(raw).await.expect("write");
        drop(client);
        read_request(&mut server, max).await
    }

    #[tokio::test]
    async fn reads_request_with_body() {
        let raw = b"POST /process-images?actions=gray%2Cblur HTTP/1.1\r\n\
                    Host: localhost\r\n\
                    Content-Length: 5\r\n\
                    \r\n\
                    hello";
        let req = read_raw(raw, 1024).await.expect("read").expect("request");
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/process-images");
        assert_eq!(req.query_param("actions"), Some("gray,blur"));
        assert_eq!(req.header("content-length"), Some("5"));
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn extra_bytes_after_body_are_ignored() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcdef";
        let req = read_raw(raw, 1024).await.expect("read").expect("request");
        assert_eq!(req.body, b"abc");
    }

    #[tokio::test]
    async fn empty_connection_yields_none() {
        assert!(read_raw(b"", 1024).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_rejected() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5000\r\n\r\n";
        let result = read_raw(raw, 1024).await;
        assert!(matches!(
            result,
            Err(SnapwerkError::PayloadTooLarge { limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_invalid() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let result = read_raw(raw, 1024).await;
        assert!(matches!(result, Err(SnapwerkError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn malformed_request_line_is_invalid() {
        let result = read_raw(b"GARBAGE\r\n\r\n", 1024).await;
        assert!(matches!(result, Err(SnapwerkError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn chunked_bodies_are_refused() {
        let raw = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n";
        let result = read_raw(raw, 1024).await;
        assert!(matches!(result, Err(SnapwerkError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn expect_continue_is_acknowledged() {
        let (mut client, mut server) = duplex(1 << 16);
        client
            .write_all(b"POST /x HTTP/1.1\r\nContent-Length: 4\r\nExpect: 100-continue\r\n\r\n")
            .await
            .expect("write head");

        let reader = tokio::spawn(async move { read_request(&mut server, 1024).await });

        let mut interim = [0u8; 25];
        client.read_exact(&mut interim).await.expect("read 100");
        assert_eq!(&interim, b"HTTP/1.1 100 Continue\r\n\r\n");

        client.write_all(b"data").await.expect("write body");
        let req = reader
            .await
            .expect("join")
            .expect("read")
            .expect("request");
        assert_eq!(req.body, b"data");
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("gray%2Cequalize"), "gray,equalize");
        assert_eq!(percent_decode("a+b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%C3%A9"), "é");
    }

    #[test]
    fn query_without_values() {
        let (path, query) = split_target("/p?flag&actions=blur&&");
        assert_eq!(path, "/p");
        assert_eq!(
            query,
            vec![
                ("flag".to_string(), String::new()),
                ("actions".to_string(), "blur".to_string()),
            ]
        );
    }

    #[test]
    fn find_subsequence_crlf() {
        let data = b"Header: value\r\n\r\nBody";
        assert_eq!(find_subsequence(data, b"\r\n\r\n"), Some(13));
        assert_eq!(find_subsequence(b"ab", b"abc"), None);
    }

    #[tokio::test]
    async fn response_framing() {
        let response = HttpResponse::new(200, "text/plain", b"ok".to_vec())
            .with_header("Content-Disposition", "inline");
        let (mut client, mut server) = duplex(4096);
        write_response(&mut server, &response).await.expect("write");
        drop(server);

        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.expect("read");
        let text = String::from_utf8(raw).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.contains("Content-Disposition: inline\r\n"));
        assert!(text.contains(&format!("X-Content-Sha256: {}\r\n", response.body_sha256())));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nok"));
    }

    #[test]
    fn error_body_is_json() {
        let response = HttpResponse::from_error(&SnapwerkError::EmptyBatch);
        assert_eq!(response.status, 400);
        let value: serde_json::Value = serde_json::from_slice(&response.body).expect("json");
        assert_eq!(value["error"], "No valid images processed");
        assert!(value["suggestion"].is_string());
        assert!(!response.headers.iter().any(|(name, _)| name == "Retry-After"));
    }

    #[test]
    fn transient_errors_ask_for_retry() {
        let response = HttpResponse::from_error(&SnapwerkError::FaceLocator("crashed".into()));
        assert_eq!(response.status, 500);
        assert!(
            response
                .headers
                .iter()
                .any(|(name, value)| name == "Retry-After" && value == "1")
        );
    }
}
