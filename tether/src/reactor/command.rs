use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::task::Waker;
use std::time::Instant;

/// Readiness direction a task waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interest {
    Read,
    Write,
}

/// Requests sent from event loops to the reactor thread.
pub(crate) enum Command {
    /// Wake `waker` once `fd` is ready in the `interest` direction.
    ///
    /// Replaces any waker previously registered for that direction.
    Register {
        fd: RawFd,
        interest: Interest,
        waker: Waker,
    },
    /// Forget `fd`; sent before the descriptor is closed.
    Deregister { fd: RawFd },
    SetTimer {
        deadline: Instant,
        waker: Waker,
        cancelled: Arc<AtomicBool>,
    },
    Shutdown,
}
