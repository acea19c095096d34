//! Lifecycle states of a spawned task.
//!
//! ```text
//!  IDLE --wake--> QUEUED --run--> RUNNING --Pending--> IDLE
//!                                   |  \--wake--> NOTIFIED --Pending--> QUEUED
//!                                   \--Ready / panic--> COMPLETED
//! ```

/// Suspended, waiting for a wake-up.
pub(crate) const IDLE: usize = 0;

/// Sitting in its event loop's run queue.
pub(crate) const QUEUED: usize = 1;

/// Being polled by its event loop.
pub(crate) const RUNNING: usize = 2;

/// Finished; the result is waiting for the join handle.
pub(crate) const COMPLETED: usize = 3;

/// Woken while running; re-queued as soon as the poll returns.
pub(crate) const NOTIFIED: usize = 4;
