use crate::net::NetSocket;

use std::net::Shutdown;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

struct ResponseState {
    status: u16,
    headers: Vec<(String, String)>,
    ended: bool,
}

/// The response half of an HTTP exchange.
///
/// Clones share state, so a handler may keep a clone and end the response
/// later from a spawned task. Every response closes its connection.
#[derive(Clone)]
pub struct HttpServerResponse {
    socket: NetSocket,
    state: Arc<Mutex<ResponseState>>,
}

impl HttpServerResponse {
    pub(crate) fn new(socket: NetSocket) -> Self {
        Self {
            socket,
            state: Arc::new(Mutex::new(ResponseState {
                status: 200,
                headers: Vec::new(),
                ended: false,
            })),
        }
    }

    /// Sets the status code; `200` by default.
    pub fn status(&self, code: u16) -> &Self {
        self.state.lock().status = code;
        self
    }

    /// Adds a response header.
    ///
    /// `Content-Length` and `Connection` are managed by the server and
    /// ignored here. Headers with an empty name, a `:` in the name, or a
    /// CR or LF anywhere are dropped.
    pub fn put_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        let (name, value) = (name.into(), value.into());

        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection") {
            debug!(header = %name, "ignoring managed header");
            return self;
        }

        if !is_valid_header(&name, &value) {
            warn!(header = ?name, "dropping malformed response header");
            return self;
        }

        self.state.lock().headers.push((name, value));
        self
    }

    /// Sends the response with `body` and closes the connection.
    ///
    /// Only the first call has an effect.
    pub fn end(&self, body: impl AsRef<[u8]>) {
        let bytes = {
            let mut state = self.state.lock();

            if state.ended {
                warn!("response already ended");
                return;
            }

            state.ended = true;
            encode(&state, body.as_ref())
        };

        let socket = self.socket.clone();

        let _ = self.socket.context().spawn(async move {
            if let Err(err) = socket.write_all(&bytes).await {
                debug!(%err, peer = %socket.peer_addr(), "failed to write response");
            }

            let _ = socket.shutdown(Shutdown::Write);
        });
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }
}

fn is_valid_header(name: &str, value: &str) -> bool {
    let breaks_line = |c: char| c == '\r' || c == '\n';

    !name.is_empty()
        && !name.contains(|c: char| c == ':' || c.is_ascii_whitespace())
        && !value.contains(breaks_line)
}

fn encode(state: &ResponseState, body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", state.status, reason(state.status));

    for (name, value) in &state.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }

    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: close\r\n\r\n");

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_status_headers_and_body() {
        let state = ResponseState {
            status: 404,
            headers: vec![("Content-Type".to_owned(), "text/plain".to_owned())],
            ended: false,
        };

        let bytes = encode(&state, b"missing");

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "HTTP/1.1 404 Not Found\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: 7\r\n\
             Connection: close\r\n\
             \r\n\
             missing"
        );
    }

    #[test]
    fn line_breaks_make_a_header_invalid() {
        assert!(is_valid_header("X-Trace", "abc def"));

        assert!(!is_valid_header("X-Trace", "abc\r\nSet-Cookie: session=1"));
        assert!(!is_valid_header("X-Trace", "abc\n"));
        assert!(!is_valid_header("X-Trace\r\nSet-Cookie", "session=1"));
        assert!(!is_valid_header("Bad Name", "x"));
        assert!(!is_valid_header("Bad:Name", "x"));
        assert!(!is_valid_header("", "x"));
    }
}
