//! HTTP response construction
//!
//! Every transient response carries `Content-Length` and `Connection: close`;
//! the connection is torn down after the write. The multipart stream preamble
//! is the sole exception — it has no length and its connection stays open for
//! as long as frames keep flowing.

/// Status line + headers + body for a fixed-length response
fn build(status: &str, extra_headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in extra_headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: close\r\n\r\n");

    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

/// 200 response with an HTML body
pub fn html(body: &str) -> Vec<u8> {
    build(
        "200 OK",
        &[
            ("Content-Type", "text/html; charset=utf-8"),
            ("Cache-Control", "no-store, no-cache, must-revalidate"),
        ],
        body.as_bytes(),
    )
}

/// 200 response with a JSON body and permissive CORS
pub fn json(body: &str) -> Vec<u8> {
    build(
        "200 OK",
        &[
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
        ],
        body.as_bytes(),
    )
}

/// 404 with an empty body
pub fn not_found() -> Vec<u8> {
    build("404 Not Found", &[], b"")
}

/// Preamble for the multipart MJPEG stream
///
/// No `Content-Length`: the body is an unbounded sequence of parts written
/// by the hub, terminated only by connection teardown.
pub fn stream_preamble(boundary: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={}\r\n\
         Cache-Control: no-store, no-cache, must-revalidate\r\n\
         Pragma: no-cache\r\n\
         Expires: 0\r\n\
         \r\n",
        boundary
    )
    .into_bytes()
}
