use super::response::HttpServerResponse;

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Largest request head (request line and headers) accepted, in bytes.
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("request head exceeds {MAX_HEAD_SIZE} bytes")]
    HeadTooLarge,

    #[error("connection closed in the middle of the request head")]
    Incomplete,

    #[error("request head is not valid UTF-8")]
    NotUtf8,

    #[error("malformed request line {0:?}")]
    MalformedRequestLine(String),

    #[error("malformed header line {0:?}")]
    MalformedHeader(String),
}

/// Request line and headers of a request, as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestHead {
    pub(crate) method: String,
    pub(crate) uri: String,
    pub(crate) version: String,
    pub(crate) headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Parses a head without its terminating blank line.
    pub(crate) fn parse(head: &str) -> Result<Self, HttpError> {
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default();

        let mut parts = request_line.split(' ');
        let (Some(method), Some(uri), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::MalformedRequestLine(request_line.to_owned()));
        };

        if method.is_empty() || uri.is_empty() || !version.starts_with("HTTP/") {
            return Err(HttpError::MalformedRequestLine(request_line.to_owned()));
        }

        let mut headers = Vec::new();

        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                return Err(HttpError::MalformedHeader(line.to_owned()));
            };

            if name.is_empty() || name.contains(|c: char| c.is_whitespace()) {
                return Err(HttpError::MalformedHeader(line.to_owned()));
            }

            headers.push((name.to_owned(), value.trim().to_owned()));
        }

        Ok(Self {
            method: method.to_owned(),
            uri: uri.to_owned(),
            version: version.to_owned(),
            headers,
        })
    }
}

/// An incoming HTTP request, handed to the request handler.
///
/// Only the head is read. The response travels with the request; the
/// handler answers through [`response`](Self::response).
pub struct HttpServerRequest {
    head: RequestHead,
    peer: SocketAddr,
    pub response: HttpServerResponse,
}

impl HttpServerRequest {
    pub(crate) fn new(head: RequestHead, peer: SocketAddr, response: HttpServerResponse) -> Self {
        Self {
            head,
            peer,
            response,
        }
    }

    pub fn method(&self) -> &str {
        &self.head.method
    }

    pub fn uri(&self) -> &str {
        &self.head.uri
    }

    /// Protocol version, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.head.version
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers, in the order received.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.head
            .headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
