//! Reactor core and event handling.
//!
//! The reactor is a dedicated thread responsible for:
//! - driving I/O readiness through `epoll`,
//! - managing timers,
//! - waking tasks when external events occur.
//!
//! It runs independently from the event loops and communicates with them
//! through commands and wakers. A woken task is rescheduled on its own
//! context's loop, so readiness never moves work across threads.

mod core;
mod event;
mod poller;
mod timer;

pub(crate) mod command;
pub(crate) mod future;

pub(crate) use core::{Reactor, ReactorHandle};
