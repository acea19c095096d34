//! OS readiness polling.
//!
//! The poller is used by the reactor to:
//! - wait for I/O readiness events,
//! - wake the reactor when new commands arrive.
//!
//! Only Linux (`epoll`) is supported.

use std::os::fd::OwnedFd;

mod epoll;

pub(crate) type Poller = epoll::EpollPoller;

/// Wake-up handle of a [`Poller`], shareable across threads.
pub(crate) struct Waker(OwnedFd);
