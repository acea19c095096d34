//! # Tether
//!
//! **Tether** is an event-loop runtime with thread-affine execution
//! contexts. Every [`ExecutionContext`] is pinned to exactly one event-loop
//! thread for its whole life, so callbacks and tasks dispatched through a
//! context never observe another thread, and code running on a loop can
//! always ask "which context am I?".
//!
//! Around that core it offers:
//!
//! - a [`ContextRegistry`] tracking which context is active on which thread,
//!   and refusing conflicting bindings
//! - a [`CompletionLatch`] for awaiting a one-shot asynchronous outcome
//! - a [`FailureAggregator`] that gathers failures raised on any loop thread
//!   and re-raises them on the thread that owns it
//! - the [`AsyncCloseable`] contract with a bounded [`await_close`]
//! - non-blocking TCP ([`net`]) and a minimal HTTP server ([`http`]) built
//!   on a single epoll reactor
//! - a test harness ([`testing`]) and the `#[tether::test]` attribute
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether::RuntimeBuilder;
//!
//! let runtime = RuntimeBuilder::new().worker_threads(2).build()?;
//! let context = runtime.new_context();
//!
//! context.execute(move || {
//!     println!("running on {:?}", std::thread::current().id());
//!     Ok(())
//! })?;
//!
//! let answer = runtime.block_on(async { 6 * 7 })?;
//! assert_eq!(answer, 42);
//! ```
//!
//! ## Modules
//!
//! - [`context`] - Execution contexts, the registry and the affinity checker
//! - [`failure`] - Failures and their aggregation
//! - [`sync`] - The completion latch
//! - [`close`] - Asynchronous close contract
//! - [`net`] - Non-blocking TCP and the connection server
//! - [`http`] - A small HTTP/1.x server
//! - [`time`] - Reactor-driven timers
//! - [`testing`] - Test harness and fixtures
//!
//! Linux only: the reactor is built on `epoll` and `eventfd`.

mod error;
mod reactor;

pub mod close;
pub mod context;
pub mod failure;
pub mod http;
pub mod net;
pub mod runtime;
pub mod sync;
pub mod testing;
pub mod time;

pub use close::{AsyncCloseable, CloseHandler, DEFAULT_CLOSE_TIMEOUT, await_close};
pub use context::{ContextId, ContextRegistry, ExecutionContext};
pub use error::Error;
pub use failure::{Failure, FailureAggregator, FailureSink};
pub use runtime::task::JoinHandle;
pub use runtime::{Handle, Runtime, RuntimeBuilder};
pub use sync::CompletionLatch;

pub use tether_macros::test;
