use super::event_loop::EventLoop;
use crate::context::{ContextRegistry, ExecutionContext};
use crate::failure::{self, Failure, FailureSink};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct Shared {
    pub(crate) loops: Vec<Arc<EventLoop>>,
    pub(crate) next: AtomicUsize,
    pub(crate) registry: Arc<ContextRegistry>,
    pub(crate) failures: Option<FailureSink>,
}

/// A cloneable, `Send` handle to a runtime.
///
/// Servers keep a handle so they can provision contexts for accepted
/// connections from any thread. The handle does not keep the runtime
/// alive: once the [`Runtime`](crate::Runtime) is dropped, contexts
/// created through it refuse work.
#[derive(Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl Handle {
    pub(crate) fn new(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Creates a context on the next event loop, round-robin.
    pub fn new_context(&self) -> ExecutionContext {
        let index = self.shared.next.fetch_add(1, Ordering::Relaxed) % self.shared.loops.len();
        self.context_on(index)
    }

    /// Creates a context pinned to event loop `worker`.
    ///
    /// Once the runtime is dropped the context is born retired: it is never
    /// registered and refuses work.
    ///
    /// # Panics
    ///
    /// Panics if `worker` is not below [`worker_threads`](Self::worker_threads).
    pub fn context_on(&self, worker: usize) -> ExecutionContext {
        assert!(
            worker < self.shared.loops.len(),
            "worker index {worker} out of range ({} event loops)",
            self.shared.loops.len()
        );

        self.shared
            .registry
            .create(self.shared.loops[worker].clone())
    }

    /// The registry recording which context runs on which thread.
    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.shared.registry
    }

    /// Number of event loops.
    pub fn worker_threads(&self) -> usize {
        self.shared.loops.len()
    }

    /// The sink fed with callback failures, if one was configured.
    pub fn failure_sink(&self) -> Option<&FailureSink> {
        self.shared.failures.as_ref()
    }

    /// Reports a failure the way the event loops do.
    pub(crate) fn report(&self, failure: Failure) {
        failure::report(self.shared.failures.as_ref(), failure);
    }

    pub(crate) fn shutdown_loops(&self) {
        for event_loop in &self.shared.loops {
            event_loop.shutdown();
        }
    }
}
