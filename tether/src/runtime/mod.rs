//! Core runtime components.
//!
//! This module contains the fundamental building blocks of the runtime:
//! - event loops, each one thread draining its own run queue,
//! - tasks and callbacks dispatched through execution contexts,
//! - the thread-local state installed on every loop thread,
//! - the builder, the owning [`Runtime`] and its cloneable [`Handle`].

mod core;
mod handle;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod event_loop;

pub mod task;

pub use builder::{RuntimeBuilder, WORKER_THREADS_ENV};
pub use core::Runtime;
pub use handle::Handle;
