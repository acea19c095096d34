//! The asynchronous close protocol.
//!
//! A closeable resource finishes its teardown on an event loop and then
//! calls the handler it was given, exactly once. Code outside the runtime
//! turns that callback into a bounded blocking wait with [`await_close`].

use crate::Error;
use crate::sync::CompletionLatch;

use std::time::Duration;

use tracing::{debug, warn};

/// Callback invoked once a close operation has completed.
pub type CloseHandler = Box<dyn FnOnce() + Send + 'static>;

/// How long [`await_close`] callers conventionally wait.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A resource whose teardown completes asynchronously.
pub trait AsyncCloseable {
    /// Starts closing the resource.
    ///
    /// `on_complete` is invoked exactly once, on an event-loop thread,
    /// when teardown has finished. Closing reports nothing else: failing
    /// to call the handler in time is the only failure signal.
    fn close(&self, on_complete: CloseHandler);
}

/// Closes `closeable` and blocks until it reports completion.
///
/// # Errors
///
/// Returns [`Error::CloseTimedOut`] if the close handler was not invoked
/// within `timeout`. The close itself keeps going.
///
/// # Panics
///
/// Panics when called on an event-loop thread.
pub fn await_close<C>(closeable: &C, timeout: Duration) -> Result<(), Error>
where
    C: AsyncCloseable + ?Sized,
{
    let latch = CompletionLatch::new();
    closeable.close(Box::new(latch.handler()));

    if latch.wait(timeout) {
        debug!("close completed");
        Ok(())
    } else {
        warn!(?timeout, "close did not complete in time");
        Err(Error::CloseTimedOut { timeout })
    }
}
