use super::request::{HttpError, HttpServerRequest, MAX_HEAD_SIZE, RequestHead};
use super::response::HttpServerResponse;
use crate::Error;
use crate::close::{AsyncCloseable, CloseHandler};
use crate::context::ExecutionContext;
use crate::failure::Failure;
use crate::net::{NetServer, NetSocket};
use crate::runtime::Handle;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Handler invoked, on the connection's context, for each request.
pub type RequestHandler =
    Arc<dyn Fn(&mut HttpServerRequest) -> Result<(), Failure> + Send + Sync>;

/// A minimal HTTP/1.x server.
///
/// One request per connection: the server reads the request head, hands
/// the request to the handler, and closes the connection once the
/// response is sent. Request bodies are not read.
///
/// A malformed or oversized head is answered with `400`, a request
/// without a handler with `404`, and a handler returning `Err` with `500`
/// (the failure itself goes to the runtime's failure sink).
pub struct HttpServer {
    net: NetServer,
    handler: Arc<Mutex<Option<RequestHandler>>>,
}

impl HttpServer {
    pub fn new(handle: &Handle) -> Self {
        let net = NetServer::new(handle);
        let slot: Arc<Mutex<Option<RequestHandler>>> = Arc::default();

        let handler = slot.clone();
        let handle = handle.clone();

        net.connect_handler(move |socket| {
            let handler = handler.lock().clone();
            let context = socket.context().clone();
            let _ = context.spawn(serve(socket, handler, handle.clone()));
            Ok(())
        });

        Self { net, handler: slot }
    }

    /// Sets the request handler, replacing any previous one.
    pub fn request_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&mut HttpServerRequest) -> Result<(), Failure> + Send + Sync + 'static,
    {
        *self.handler.lock() = Some(Arc::new(handler));
        self
    }

    /// Binds `address` and starts serving.
    ///
    /// # Errors
    ///
    /// See [`NetServer::listen`].
    pub fn listen(&self, address: impl ToSocketAddrs) -> Result<SocketAddr, Error> {
        self.net.listen(address)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.net.local_addr()
    }

    pub fn context(&self) -> &ExecutionContext {
        self.net.context()
    }
}

impl AsyncCloseable for HttpServer {
    fn close(&self, on_complete: CloseHandler) {
        self.net.close(on_complete);
    }
}

async fn serve(socket: NetSocket, handler: Option<RequestHandler>, handle: Handle) {
    let response = HttpServerResponse::new(socket.clone());

    let parsed = match read_head(&socket).await {
        Ok(Some(raw)) => RequestHead::parse(&raw),
        Ok(None) => {
            debug!(peer = %socket.peer_addr(), "connection closed before a request");
            return;
        }
        Err(err) => Err(err),
    };

    let head = match parsed {
        Ok(head) => head,
        Err(HttpError::Io(err)) => {
            debug!(%err, peer = %socket.peer_addr(), "failed to read request");
            return;
        }
        Err(err) => {
            debug!(%err, peer = %socket.peer_addr(), "rejecting request");
            response.status(400).end("");
            return;
        }
    };

    let Some(handler) = handler else {
        response.status(404).end("");
        return;
    };

    let mut request = HttpServerRequest::new(head, socket.peer_addr(), response.clone());

    if let Err(failure) = handler(&mut request) {
        handle.report(failure);

        if !response.is_ended() {
            response.status(500).end("");
        }
    }
}

/// Reads up to the blank line ending the head.
///
/// `Ok(None)` if the peer closed the connection without sending anything.
async fn read_head(socket: &NetSocket) -> Result<Option<String>, HttpError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            if end > MAX_HEAD_SIZE {
                return Err(HttpError::HeadTooLarge);
            }

            buffer.truncate(end);
            return String::from_utf8(buffer)
                .map(Some)
                .map_err(|_| HttpError::NotUtf8);
        }

        if buffer.len() > MAX_HEAD_SIZE {
            return Err(HttpError::HeadTooLarge);
        }

        let n = socket.read(&mut chunk).await?;

        if n == 0 {
            return if buffer.is_empty() {
                Ok(None)
            } else {
                Err(HttpError::Incomplete)
            };
        }

        buffer.extend_from_slice(&chunk[..n]);
    }
}
