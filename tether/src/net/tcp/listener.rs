use super::stream::TcpStream;
use crate::reactor::command::Interest;
use crate::reactor::future::{deregister, poll_io};

use std::future::poll_fn;
use std::io;
use std::net::{self, SocketAddr, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::task::{Context, Poll};

/// An asynchronous TCP listener.
///
/// `TcpListener` listens for incoming TCP connections and integrates
/// with the runtime reactor to accept connections without blocking.
///
/// Binding may happen on any thread; accepting must happen on an event
/// loop.
pub struct TcpListener {
    inner: net::TcpListener,
}

impl TcpListener {
    /// Binds a non-blocking TCP listener to `address`.
    ///
    /// Port `0` picks a free port; read it back with
    /// [`local_addr`](Self::local_addr).
    pub fn bind(address: impl ToSocketAddrs) -> io::Result<Self> {
        let inner = net::TcpListener::bind(address)?;
        inner.set_nonblocking(true)?;

        Ok(Self { inner })
    }

    /// Accepts an incoming TCP connection.
    ///
    /// This method asynchronously waits until a client connects,
    /// then returns a [`TcpStream`] and the peer address.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        poll_fn(|cx| self.poll_accept(cx)).await
    }

    pub(crate) fn poll_accept(
        &self,
        cx: &mut Context<'_>,
    ) -> Poll<io::Result<(TcpStream, SocketAddr)>> {
        poll_io(self.fd(), Interest::Read, cx, || self.inner.accept()).map(|accepted| {
            let (stream, peer) = accepted?;
            Ok((TcpStream::from_std(stream)?, peer))
        })
    }

    /// Returns the local socket address of this listener.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl Drop for TcpListener {
    /// Forgets the socket in the reactor; the descriptor closes right after.
    fn drop(&mut self) {
        deregister(self.fd());
    }
}
