//! Minimal HTTP surface.
//!
//! Builds the fixed plain-text response and reads just enough of a request to
//! answer it. There is no routing and no header handling.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Upper bound on a plain request head.
pub const MAX_HEAD_SIZE: usize = 8192;

/// Request the client sends on the fallback path.
pub const PLAIN_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";

/// Build an HTTP/1.1 response with `Content-Length` and `Content-Type`.
pub fn http_response(code: u16, reason: &str, body: &[u8], mime: &str) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: {}\r\n\r\n",
        code,
        reason,
        body.len(),
        mime
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Turns a decoded request into a response payload.
pub trait RequestHandler: Send + Sync {
    /// Produce the response for `request`.
    fn handle(&self, request: &[u8]) -> Vec<u8>;
}

/// Answers every request with the same `200 OK` plain-text body.
#[derive(Debug, Clone)]
pub struct StaticResponder {
    response: Vec<u8>,
}

impl StaticResponder {
    /// Respond with `body` as `text/plain`.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            response: http_response(200, "OK", &body.into(), "text/plain"),
        }
    }

    /// Full response bytes.
    pub fn response(&self) -> &[u8] {
        &self.response
    }
}

impl RequestHandler for StaticResponder {
    fn handle(&self, _request: &[u8]) -> Vec<u8> {
        self.response.clone()
    }
}

/// Read a request head up to the blank line, EOF, or `limit` bytes.
pub async fn read_request_head<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(512);
    let mut chunk = [0u8; 1024];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);

        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if head.len() > limit {
            return Err(Error::PayloadTooLarge { limit });
        }
    }

    Ok(head)
}

/// Status line of an HTTP response, if there is one.
pub fn status_line(response: &[u8]) -> Option<&str> {
    let end = response.windows(2).position(|w| w == b"\r\n")?;
    std::str::from_utf8(&response[..end]).ok()
}
