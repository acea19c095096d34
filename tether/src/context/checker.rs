use super::{ContextId, ContextRegistry};
use crate::failure::{Failure, FailureSink};

use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Snapshot of "where am I running" taken at construction, checked later.
///
/// Create a checker at the start of an asynchronous chain, then call
/// [`check`](Self::check) from every callback of the chain: each one must
/// run on the same thread, under the same context.
#[derive(Clone)]
pub struct ContextChecker {
    thread: ThreadId,
    context: Option<ContextId>,
    registry: Arc<ContextRegistry>,
}

impl ContextChecker {
    pub fn new(registry: Arc<ContextRegistry>) -> Self {
        let thread = thread::current().id();
        let context = registry.current_on(thread).map(|context| context.id());

        Self {
            thread,
            context,
            registry,
        }
    }

    /// The thread captured at construction.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// The context captured at construction, if any was active.
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// Verifies that the caller still runs on the captured thread and
    /// context. A mismatch is recorded in `sink` and returned.
    #[track_caller]
    pub fn check(&self, sink: &FailureSink) -> Result<(), Failure> {
        let actual = thread::current().id();

        if actual != self.thread {
            return Err(sink.record_and_propagate(Failure::new(format!(
                "Expected: {:?} Actual: {:?}",
                self.thread, actual
            ))));
        }

        let current = self.registry.current_on(actual).map(|context| context.id());

        if current != self.context {
            return Err(sink.record_and_propagate(Failure::new(format!(
                "Expected: {:?} Actual: {:?}",
                self.context, current
            ))));
        }

        Ok(())
    }
}
