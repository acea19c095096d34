use crate::reactor::ReactorHandle;

use std::cell::{Cell, RefCell};

thread_local! {
    /// Thread-local handle to the reactor of the runtime owning this thread.
    ///
    /// Installed for the whole life of an event-loop thread so timers and
    /// sockets can register interest without explicit parameter passing.
    pub(crate) static CURRENT_REACTOR: RefCell<Option<ReactorHandle>> =
        const { RefCell::new(None) };

    /// Index of the event loop running on this thread, if any.
    pub(crate) static CURRENT_LOOP: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Installs the event-loop thread-locals for the duration of `f`.
///
/// The previous values are restored afterwards, so nested runtimes on the
/// same thread (tests do this) behave.
pub(crate) fn enter_loop<R>(index: usize, reactor: ReactorHandle, f: impl FnOnce() -> R) -> R {
    let prev_reactor = CURRENT_REACTOR.with(|r| r.replace(Some(reactor)));
    let prev_loop = CURRENT_LOOP.with(|l| l.replace(Some(index)));

    let out = f();

    CURRENT_LOOP.with(|l| l.set(prev_loop));
    CURRENT_REACTOR.with(|r| r.replace(prev_reactor));

    out
}

/// Returns `true` when called from an event-loop thread.
pub(crate) fn on_event_loop() -> bool {
    CURRENT_LOOP.with(|l| l.get().is_some())
}

/// Runs `f` with the current thread's reactor, if one is installed.
pub(crate) fn with_reactor<R>(f: impl FnOnce(&ReactorHandle) -> R) -> Option<R> {
    CURRENT_REACTOR.with(|r| r.borrow().as_ref().map(f))
}
