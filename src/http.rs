//! Minimal HTTP/1.1 front door: reads the first request off a freshly
//! accepted socket, distinguishes a WebSocket upgrade from a plain page
//! fetch, and writes the appropriate response.
//!
//! Only a single `read` is issued — adequate for LAN use, where the request
//! arrives in one segment.

use std::io::{self, Read, Write};

use crate::asset::INDEX_HTML;
use crate::ws;

pub const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("socket read failed: {0}")]
    Read(#[source] io::Error),
    #[error("socket write failed: {0}")]
    Write(#[source] io::Error),
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("peer closed before sending a request")]
    EmptyRequest,
}

struct Request {
    path: String,
    ws_key: Option<String>,
}

/// What the front door decided to do with a freshly accepted connection.
pub enum FrontDoorOutcome {
    /// The 101 response was written; the bridge loop should take over.
    Upgraded,
    /// A final response (page, 404, or error) was written; the caller
    /// should close the socket.
    Responded,
}

/// Read one HTTP request and respond. On `Upgraded`, the socket is left
/// open with the 101 response already flushed.
pub fn handle_request<S: Read + Write>(stream: &mut S) -> Result<FrontDoorOutcome, HttpError> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let n = stream.read(&mut buf).map_err(HttpError::Read)?;
    if n == 0 {
        return Err(HttpError::EmptyRequest);
    }
    buf.truncate(n);

    let request = parse_request(&buf)?;

    if let Some(key) = request.ws_key.filter(|k| !k.is_empty()) {
        let accept = ws::accept_key(&key);
        write_upgrade_response(stream, &accept)?;
        return Ok(FrontDoorOutcome::Upgraded);
    }

    match request.path.as_str() {
        "/" | "/index.html" => {
            write_response(stream, 200, "OK", "text/html", INDEX_HTML.as_bytes())?;
        }
        _ => {
            write_response(stream, 404, "Not Found", "text/plain", b"404 Not Found")?;
        }
    }
    Ok(FrontDoorOutcome::Responded)
}

fn parse_request(buf: &[u8]) -> Result<Request, HttpError> {
    let text = String::from_utf8_lossy(buf);
    let first_line = text.lines().next().ok_or(HttpError::MalformedRequestLine)?;

    let mut parts = first_line.splitn(3, ' ');
    let _method = parts.next().ok_or(HttpError::MalformedRequestLine)?;
    let path = parts
        .next()
        .ok_or(HttpError::MalformedRequestLine)?
        .to_string();

    let ws_key = text
        .split("\r\n")
        .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
        .map(|v| v.trim_end_matches('\r').to_string());

    Ok(Request { path, ws_key })
}

fn write_response<S: Write>(
    stream: &mut S,
    status: u16,
    status_text: &str,
    content_type: &str,
    body: &[u8],
) -> Result<(), HttpError> {
    let header = format!(
        "HTTP/1.1 {status} {status_text}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream
        .write_all(header.as_bytes())
        .map_err(HttpError::Write)?;
    stream.write_all(body).map_err(HttpError::Write)?;
    Ok(())
}

fn write_upgrade_response<S: Write>(stream: &mut S, accept_key: &str) -> Result<(), HttpError> {
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept_key}\r\n\r\n"
    );
    stream
        .write_all(response.as_bytes())
        .map_err(HttpError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A `Read + Write` fake that serves `input` and records writes.
    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn fake(input: &str) -> FakeStream {
        FakeStream {
            input: Cursor::new(input.as_bytes().to_vec()),
            output: Vec::new(),
        }
    }

    #[test]
    fn page_fetch_returns_embedded_html() {
        let mut s = fake("GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        let outcome = handle_request(&mut s).unwrap();
        assert!(matches!(outcome, FrontDoorOutcome::Responded));
        let response = String::from_utf8(s.output).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Content-Type: text/html"));
        assert!(response.ends_with(INDEX_HTML));
    }

    #[test]
    fn unknown_path_returns_404() {
        let mut s = fake("GET /nope HTTP/1.1\r\nHost: x\r\n\r\n");
        handle_request(&mut s).unwrap();
        let response = String::from_utf8(s.output).unwrap();
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
    }

    #[test]
    fn upgrade_request_yields_accept_key_seed_vector() {
        let mut s = fake(
            "GET /ws HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
        );
        let outcome = handle_request(&mut s).unwrap();
        assert!(matches!(outcome, FrontDoorOutcome::Upgraded));
        let response = String::from_utf8(s.output).unwrap();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn any_upgrade_path_is_honored() {
        // The request path is not checked when a Sec-WebSocket-Key is present.
        let mut s = fake(
            "GET /anything HTTP/1.1\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        );
        let outcome = handle_request(&mut s).unwrap();
        assert!(matches!(outcome, FrontDoorOutcome::Upgraded));
    }
}
