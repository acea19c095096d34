use super::command::{Command, Interest};
use crate::runtime::context::with_reactor;

use std::io;
use std::os::fd::RawFd;
use std::task::{Context, Poll, Waker};

/// Drives one non-blocking syscall to completion.
///
/// `op` is retried on `EINTR`. On `EWOULDBLOCK` the task registers its
/// waker for `interest` on `fd` and yields; the reactor is level-triggered,
/// so readiness that arrived before the registration still wakes it.
pub(crate) fn poll_io<T>(
    fd: RawFd,
    interest: Interest,
    cx: &mut Context<'_>,
    mut op: impl FnMut() -> io::Result<T>,
) -> Poll<io::Result<T>> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                return match register(fd, interest, cx.waker()) {
                    Ok(()) => Poll::Pending,
                    Err(err) => Poll::Ready(Err(err)),
                };
            }
            result => return Poll::Ready(result),
        }
    }
}

fn register(fd: RawFd, interest: Interest, waker: &Waker) -> io::Result<()> {
    let sent = with_reactor(|reactor| {
        reactor.send(Command::Register {
            fd,
            interest,
            waker: waker.clone(),
        })
    });

    match sent {
        Some(true) => Ok(()),
        Some(false) => Err(io::Error::other("reactor is shut down")),
        None => Err(io::Error::other("socket polled outside of an event loop")),
    }
}

/// Forgets `fd` in the current reactor, if the thread has one.
pub(crate) fn deregister(fd: RawFd) {
    with_reactor(|reactor| reactor.send(Command::Deregister { fd }));
}
