//! HTTP request parsing
//!
//! Parsing is permissive by design: unknown headers are ignored, any method
//! is tolerated (unmatched routes become 404s downstream), and the query
//! string is split off the path so routing sees `/stream` for
//! `/stream?t=123`. Malformed input is an error, never a panic.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Separator between head and body
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// One parsed HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, as sent (`GET`, `POST`, ...)
    pub method: String,

    /// Path with the query string stripped (`/stream`)
    pub path: String,

    /// Query string, if any, without the leading `?`
    pub query: Option<String>,

    /// Header name/value pairs in arrival order, names lowercased
    pub headers: Vec<(String, String)>,

    /// Request body (everything after the blank line)
    pub body: Vec<u8>,
}

impl Request {
    /// Parse a complete request from raw bytes
    ///
    /// `raw` must contain the full head; any bytes after the blank line are
    /// taken as the body (callers using [`read_request`] get the body sized
    /// by `Content-Length`).
    pub fn parse(raw: &[u8]) -> Result<Request> {
        let head_end = find_head_end(raw)
            .ok_or_else(|| Error::InvalidRequest("missing header terminator".into()))?;

        let head = std::str::from_utf8(&raw[..head_end])
            .map_err(|_| Error::InvalidRequest("non-UTF8 request head".into()))?;
        let body = raw[head_end + HEAD_TERMINATOR.len()..].to_vec();

        let mut lines = head.split("\r\n");
        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidRequest("empty request".into()))?;

        let mut parts = request_line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| Error::InvalidRequest("missing method".into()))?
            .to_string();
        let target = parts
            .next()
            .ok_or_else(|| Error::InvalidRequest("missing request target".into()))?;

        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            // Tolerate junk header lines rather than failing the request
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        Ok(Request {
            method,
            path,
            query,
            headers,
            body,
        })
    }

    /// Look up a header value, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Declared body length, if the header is present and numeric
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }
}

/// Offset of the blank line separating head from body
fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

/// Read one request off a socket
///
/// Reads until the head terminator appears, then reads the declared
/// `Content-Length` worth of body. Returns `Ok(None)` on clean EOF before
/// any bytes arrive (peer connected and went away). Requests larger than
/// `max_bytes` are rejected.
pub async fn read_request<S>(stream: &mut S, max_bytes: usize) -> Result<Option<Request>>
where
    S: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    // Read until the full head is buffered
    loop {
        if find_head_end(&buf).is_some() {
            break;
        }
        if buf.len() > max_bytes {
            return Err(Error::InvalidRequest("request head too large".into()));
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(Error::InvalidRequest("connection closed mid-request".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request = Request::parse(&buf)?;

    // Read the remainder of the body, if a length was declared
    if let Some(len) = request.content_length() {
        if len > max_bytes {
            return Err(Error::InvalidRequest("request body too large".into()));
        }
        let mut body = std::mem::take(&mut request.body);
        while body.len() < len {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::InvalidRequest("connection closed mid-body".into()));
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(len);
        request.body = body;
    }

    Ok(Some(request))
}
