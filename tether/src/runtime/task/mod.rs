//! Work items run by event loops.
//!
//! It includes:
//! - the [`Runnable`] abstraction shared by callbacks and futures,
//! - spawned tasks, their state machine and join handles,
//! - one-shot callbacks queued through `ExecutionContext::execute`.

mod callback;
mod core;
mod handle;
mod state;

pub(crate) use callback::Callback;
pub(crate) use core::{Runnable, Task};

pub use handle::JoinHandle;
