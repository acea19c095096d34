//! Execution contexts and thread affinity.
//!
//! An [`ExecutionContext`] is a logical unit of sequential execution pinned
//! to exactly one event-loop thread for its whole life. Every callback and
//! every poll of a future dispatched through a context runs on that thread,
//! one at a time, so handler code can rely on single-threaded access without
//! further synchronization.
//!
//! The [`ContextRegistry`] of a runtime records which context is active on
//! which thread. The runtime is the only writer; application and test code
//! read it through [`ContextRegistry::current`],
//! [`ContextRegistry::assert_affinity`] or a [`ContextChecker`].

mod checker;
mod registry;

pub use checker::ContextChecker;
pub use registry::{AffinityViolation, BindError, BindGuard, ContextRegistry};

use crate::Error;
use crate::failure::Failure;
use crate::runtime::event_loop::EventLoop;
use crate::runtime::task::{Callback, JoinHandle, Task};

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

/// Opaque identifier of an [`ExecutionContext`].
///
/// Identifiers are allocated from a monotonic counter and never reused
/// within a runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A logical execution context pinned to one event-loop thread.
///
/// Contexts are created by the runtime ([`Runtime::new_context`],
/// servers, accepted connections) and passed around explicitly. Cloning
/// a context yields another handle to the same context. The context is
/// retired from its registry once the last handle is dropped; its id is
/// never handed out again.
///
/// [`Runtime::new_context`]: crate::Runtime::new_context
#[derive(Clone)]
pub struct ExecutionContext {
    id: ContextId,
    event_loop: Arc<EventLoop>,
    _lease: Arc<Lease>,
}

/// Shared by every handle of a context.
struct Lease {
    id: ContextId,
    registry: Weak<ContextRegistry>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.retire(self.id);
        }
    }
}

impl ExecutionContext {
    pub(crate) fn new(
        id: ContextId,
        event_loop: Arc<EventLoop>,
        registry: Weak<ContextRegistry>,
    ) -> Self {
        Self {
            id,
            event_loop,
            _lease: Arc::new(Lease { id, registry }),
        }
    }

    /// Returns the identifier of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the thread this context is pinned to.
    pub fn thread(&self) -> ThreadId {
        self.event_loop.thread()
    }

    /// Returns the index of the event loop owning this context.
    pub fn worker(&self) -> usize {
        self.event_loop.index()
    }

    pub(crate) fn event_loop(&self) -> &Arc<EventLoop> {
        &self.event_loop
    }

    /// Runs `callback` on this context's thread.
    ///
    /// A returned `Err` and any panic are captured by the event loop and
    /// forwarded to the runtime's failure sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeShutdown`] if the owning event loop has
    /// stopped; the callback is dropped without running.
    pub fn execute<F>(&self, callback: F) -> Result<(), Error>
    where
        F: FnOnce() -> Result<(), Failure> + Send + 'static,
    {
        let callback = Arc::new(Callback::new(self.clone(), callback));

        if self.event_loop.schedule(callback) {
            Ok(())
        } else {
            Err(Error::RuntimeShutdown)
        }
    }

    /// Spawns a future whose every poll runs on this context's thread.
    ///
    /// The returned [`JoinHandle`] resolves to the future's output, or to
    /// the captured [`Failure`] if the future panicked or the event loop
    /// was already stopped.
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let task = Arc::new(Task::new(self.clone(), future));

        if !self.event_loop.schedule(task.clone()) {
            task.abandon(Failure::new(format!(
                "event loop of {} stopped before the task could run",
                self.id
            )));
        }

        JoinHandle::new(task)
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExecutionContext {}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("worker", &self.event_loop.index())
            .field("thread", &self.event_loop.thread())
            .finish()
    }
}
