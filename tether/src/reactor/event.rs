use std::os::fd::RawFd;

/// Readiness reported by the poller for one file descriptor.
///
/// Error and hang-up conditions are reported as both readable and
/// writable, so every waiting task gets to observe them.
pub(crate) struct Event {
    pub(crate) fd: RawFd,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}
