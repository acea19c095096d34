//! Linux `epoll`-based poller implementation.
//!
//! Responsibilities:
//! - Watch file descriptors for read/write readiness (level-triggered)
//! - Block waiting for readiness, bounded by the next timer deadline
//! - Wake the reactor thread when new commands are submitted

use super::Waker;
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// Reserved token used internally for the wake-up event.
///
/// File descriptors are used as tokens, so `u64::MAX` cannot collide.
const WAKE_TOKEN: u64 = u64::MAX;

const EVENT_CAPACITY: usize = 64;

/// Linux `epoll` poller.
///
/// This poller owns an `epoll` instance, an `eventfd` used as a wake-up
/// signal, and a reusable event buffer.
pub(crate) struct EpollPoller {
    epoll: OwnedFd,
    events: Vec<epoll_event>,
    waker: Arc<Waker>,
}

impl Waker {
    /// Interrupts a blocking `epoll_wait`.
    pub(crate) fn wake(&self) {
        let buf: u64 = 1;
        // a full counter already guarantees a pending wake-up
        let _ = unsafe { libc::write(self.0.as_raw_fd(), &buf as *const u64 as *const _, 8) };
    }

    fn reset(&self) {
        let mut buf = 0u64;
        let _ = unsafe { libc::read(self.0.as_raw_fd(), &mut buf as *mut u64 as *mut _, 8) };
    }
}

fn check(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

impl EpollPoller {
    pub(crate) fn new() -> io::Result<Self> {
        let epoll = check(unsafe { epoll_create1(EPOLL_CLOEXEC) })?;
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };

        let eventfd = check(unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) })?;
        let eventfd = unsafe { OwnedFd::from_raw_fd(eventfd) };

        let poller = Self {
            epoll,
            events: vec![epoll_event { events: 0, u64: 0 }; EVENT_CAPACITY],
            waker: Arc::new(Waker(eventfd)),
        };

        poller.ctl(
            EPOLL_CTL_ADD,
            poller.waker.0.as_raw_fd(),
            EPOLLIN as u32,
            WAKE_TOKEN,
        )?;

        Ok(poller)
    }

    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, flags: u32, token: u64) -> io::Result<()> {
        let mut event = epoll_event {
            events: flags,
            u64: token,
        };

        check(unsafe { epoll_ctl(self.epoll.as_raw_fd(), op, fd, &mut event) }).map(drop)
    }

    /// Sets the interest of `fd`, adding it to the interest list if needed.
    pub(crate) fn update(&self, fd: RawFd, read: bool, write: bool) -> io::Result<()> {
        let mut flags = 0;

        if read {
            flags |= EPOLLIN;
        }
        if write {
            flags |= EPOLLOUT;
        }

        match self.ctl(EPOLL_CTL_MOD, fd, flags as u32, fd as u64) {
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => {
                self.ctl(EPOLL_CTL_ADD, fd, flags as u32, fd as u64)
            }
            result => result,
        }
    }

    /// Removes `fd` from the interest list.
    ///
    /// Errors are ignored: a closed descriptor already left the list.
    pub(crate) fn remove(&self, fd: RawFd) {
        let _ = unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            )
        };
    }

    /// Waits for readiness events.
    ///
    /// Blocks until a descriptor becomes ready, the waker fires, or the
    /// timeout expires. `events` is cleared first.
    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        // round up, so a pending timer never degrades into a busy loop
        let timeout_ms = timeout
            .map(|t| t.as_nanos().div_ceil(1_000_000).min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                self.events.as_mut_ptr(),
                self.events.len() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        for ev in &self.events[..n as usize] {
            let (token, flags) = (ev.u64, ev.events);

            if token == WAKE_TOKEN {
                self.waker.reset();
                continue;
            }

            let failed = flags & ((EPOLLERR | EPOLLHUP) as u32) != 0;

            events.push(Event {
                fd: token as RawFd,
                readable: failed || flags & (EPOLLIN as u32) != 0,
                writable: failed || flags & (EPOLLOUT as u32) != 0,
            });
        }

        Ok(())
    }
}
