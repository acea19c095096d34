use super::tcp::listener::TcpListener;
use super::tcp::stream::TcpStream;
use crate::Error;
use crate::close::{AsyncCloseable, CloseHandler};
use crate::context::ExecutionContext;
use crate::failure::Failure;
use crate::runtime::Handle;

use std::collections::HashMap;
use std::future::poll_fn;
use std::io;
use std::mem;
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Handler invoked, on the connection's own context, for each accepted
/// connection.
pub type ConnectHandler = Arc<dyn Fn(NetSocket) -> Result<(), Failure> + Send + Sync>;

/// An accepted connection together with the context it belongs to.
///
/// Clones share the underlying socket. Everything done with a socket
/// should run on [`context`](Self::context).
#[derive(Clone)]
pub struct NetSocket {
    id: u64,
    context: ExecutionContext,
    stream: Arc<TcpStream>,
    peer: SocketAddr,
}

impl NetSocket {
    /// Server-local connection number.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The context every callback of this connection runs on.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub async fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buffer).await
    }

    pub async fn write_all(&self, buffer: &[u8]) -> io::Result<()> {
        self.stream.write_all(buffer).await
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.stream.shutdown(how)
    }
}

#[derive(Default)]
struct ServerState {
    listener: Option<Arc<TcpListener>>,
    local_addr: Option<SocketAddr>,
    accept_waker: Option<Waker>,
    connections: HashMap<u64, Weak<TcpStream>>,
    next_connection: u64,
    closed: bool,
}

struct ServerInner {
    handle: Handle,
    context: ExecutionContext,
    handler: Mutex<Option<ConnectHandler>>,
    state: Mutex<ServerState>,
}

/// A TCP server.
///
/// The accept loop runs on the server's own context; every accepted
/// connection gets a fresh context from the runtime, and the connect
/// handler runs there.
///
/// # Examples
///
/// ```rust,ignore
/// let server = NetServer::new(runtime.handle());
/// server.connect_handler(|socket| {
///     socket.context().spawn(async move {
///         let _ = socket.write_all(b"hello\n").await;
///     });
///     Ok(())
/// });
///
/// let addr = server.listen("127.0.0.1:0")?;
/// await_close(&server, DEFAULT_CLOSE_TIMEOUT)?;
/// ```
pub struct NetServer {
    inner: Arc<ServerInner>,
}

impl NetServer {
    pub fn new(handle: &Handle) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                handle: handle.clone(),
                context: handle.new_context(),
                handler: Mutex::new(None),
                state: Mutex::new(ServerState::default()),
            }),
        }
    }

    /// Sets the handler for new connections, replacing any previous one.
    pub fn connect_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(NetSocket) -> Result<(), Failure> + Send + Sync + 'static,
    {
        *self.inner.handler.lock() = Some(Arc::new(handler));
        self
    }

    /// Binds `address` and starts accepting connections.
    ///
    /// Returns the bound address, which tells the port when `address`
    /// used port `0`.
    ///
    /// # Errors
    ///
    /// Fails if binding fails, or if the server is already listening or
    /// closed.
    pub fn listen(&self, address: impl ToSocketAddrs) -> Result<SocketAddr, Error> {
        let mut state = self.inner.state.lock();

        if state.closed {
            return Err(Error::InvalidState("server is closed"));
        }
        if state.listener.is_some() {
            return Err(Error::InvalidState("server is already listening"));
        }

        let listener = TcpListener::bind(address)?;
        let addr = listener.local_addr()?;

        state.listener = Some(Arc::new(listener));
        state.local_addr = Some(addr);
        drop(state);

        let _ = self.inner.context.spawn(self.inner.clone().accept_loop());

        info!(%addr, context = %self.inner.context.id(), "net server listening");

        Ok(addr)
    }

    /// The bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.state.lock().local_addr
    }

    /// The context running the accept loop and the close handler.
    pub fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }
}

impl Drop for NetServer {
    /// Stops accepting. Live connections are left running.
    fn drop(&mut self) {
        let inner = self.inner.clone();

        let _ = self.inner.context.execute(move || {
            if inner.stop_accepting() {
                debug!(context = %inner.context.id(), "net server dropped without close");
            }
            Ok(())
        });
    }
}

impl AsyncCloseable for NetServer {
    /// Stops accepting, shuts down live connections, then calls
    /// `on_complete` on the server's context.
    ///
    /// Closing an already closed server only calls `on_complete`.
    fn close(&self, on_complete: CloseHandler) {
        let inner = self.inner.clone();

        let scheduled = self.inner.context.execute(move || {
            inner.shutdown();
            on_complete();
            Ok(())
        });

        if let Err(err) = scheduled {
            warn!(%err, "cannot close net server, close handler dropped");
        }
    }
}

impl ServerInner {
    async fn accept_loop(self: Arc<Self>) {
        debug!(context = %self.context.id(), "accept loop started");

        while let Some(accepted) = poll_fn(|cx| self.poll_accept(cx)).await {
            match accepted {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(err) => warn!(%err, "accept failed"),
            }
        }

        debug!(context = %self.context.id(), "accept loop finished");
    }

    /// `Ready(None)` once the server is closed.
    fn poll_accept(
        &self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<(TcpStream, SocketAddr)>>> {
        let listener = {
            let mut state = self.state.lock();

            if state.closed {
                return Poll::Ready(None);
            }

            state.accept_waker = Some(cx.waker().clone());

            match &state.listener {
                Some(listener) => listener.clone(),
                None => return Poll::Ready(None),
            }
        };

        listener.poll_accept(cx).map(Some)
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let Some(handler) = self.handler.lock().clone() else {
            debug!(%peer, "no connect handler, dropping connection");
            return;
        };

        let stream = Arc::new(stream);

        let id = {
            let mut state = self.state.lock();
            state.connections.retain(|_, c| c.strong_count() > 0);
            state.next_connection += 1;

            let id = state.next_connection;
            state.connections.insert(id, Arc::downgrade(&stream));
            id
        };

        let context = self.handle.new_context();
        debug!(%peer, connection = id, context = %context.id(), "connection accepted");

        let socket = NetSocket {
            id,
            context: context.clone(),
            stream,
            peer,
        };

        if let Err(err) = context.execute(move || handler(socket)) {
            warn!(%err, connection = id, "cannot dispatch connection");
        }
    }

    /// Marks the server closed and releases the listener.
    ///
    /// Returns `false` if the server was already closed.
    fn stop_accepting(&self) -> bool {
        let (first, listener, waker) = {
            let mut state = self.state.lock();
            let first = !state.closed;
            state.closed = true;

            (first, state.listener.take(), state.accept_waker.take())
        };

        // on this loop, so the reactor forgets the socket before it closes
        drop(listener);

        if let Some(waker) = waker {
            waker.wake();
        }

        first
    }

    fn shutdown(&self) {
        let first = self.stop_accepting();
        let connections = mem::take(&mut self.state.lock().connections);

        let mut live = 0;
        for connection in connections.values().filter_map(Weak::upgrade) {
            let _ = connection.shutdown(Shutdown::Both);
            live += 1;
        }

        if first {
            info!(context = %self.context.id(), connections = live, "net server closed");
        }
    }
}
