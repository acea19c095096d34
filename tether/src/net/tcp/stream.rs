use crate::reactor::command::Interest;
use crate::reactor::future::{deregister, poll_io};

use std::future::poll_fn;
use std::io::{self, Read, Write};
use std::net::{self, Shutdown, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};

/// An asynchronous TCP stream.
///
/// `TcpStream` is a non-blocking TCP connection integrated with the
/// runtime reactor. All methods take `&self`, so a stream shared behind an
/// `Arc` can be read by one task while another writes.
///
/// Reads and writes must be awaited on an event-loop thread.
pub struct TcpStream {
    inner: net::TcpStream,
}

impl TcpStream {
    /// Wraps a connected std stream, switching it to non-blocking mode.
    pub fn from_std(inner: net::TcpStream) -> io::Result<Self> {
        inner.set_nonblocking(true)?;
        Ok(Self { inner })
    }

    /// Reads up to `buffer.len()` bytes; `Ok(0)` means the peer closed.
    pub async fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        poll_fn(|cx| {
            poll_io(self.fd(), Interest::Read, cx, || (&self.inner).read(buffer))
        })
        .await
    }

    /// Writes some of `buffer`, returning how many bytes were written.
    pub async fn write(&self, buffer: &[u8]) -> io::Result<usize> {
        poll_fn(|cx| {
            poll_io(self.fd(), Interest::Write, cx, || (&self.inner).write(buffer))
        })
        .await
    }

    /// Writes the entire buffer to the stream.
    ///
    /// # Errors
    ///
    /// Returns `WriteZero` if the socket stops accepting data.
    pub async fn write_all(&self, mut buffer: &[u8]) -> io::Result<()> {
        while !buffer.is_empty() {
            let n = self.write(buffer).await?;

            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                ));
            }

            buffer = &buffer[n..];
        }

        Ok(())
    }

    /// Shuts down the read, write, or both halves of this connection.
    ///
    /// Pending reads on the other side of a shut-down half complete with
    /// `Ok(0)`.
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.inner.shutdown(how)
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        deregister(self.fd());
    }
}
