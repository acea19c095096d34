use super::queue::RunQueue;
use crate::context::ContextRegistry;
use crate::failure::{self, Failure, FailureSink};
use crate::reactor::ReactorHandle;
use crate::runtime::context::enter_loop;
use crate::runtime::task::Runnable;

use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::{debug, debug_span, error};

/// The body of an event-loop thread.
///
/// The worker pops work items from its queue in FIFO order. Around each
/// item it binds the item's context in the registry, so the registry
/// always reflects which context is running where. Errors and panics
/// escaping the item go to the failure sink.
pub(crate) struct Worker {
    index: usize,
    queue: Arc<RunQueue>,
    registry: Arc<ContextRegistry>,
    reactor: ReactorHandle,
    failures: Option<FailureSink>,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        queue: Arc<RunQueue>,
        registry: Arc<ContextRegistry>,
        reactor: ReactorHandle,
        failures: Option<FailureSink>,
    ) -> Self {
        Self {
            index,
            queue,
            registry,
            reactor,
            failures,
        }
    }

    /// Runs until the queue is shut down, then retires every context
    /// pinned to this thread.
    pub(crate) fn run(self) {
        let thread = thread::current().id();
        let _span = debug_span!("event_loop", worker = self.index).entered();

        debug!("event loop started");

        enter_loop(self.index, self.reactor.clone(), || {
            while let Some(item) = self.queue.next() {
                self.dispatch(item, thread);
            }
        });

        let dropped = self.queue.drain().len();
        let retired = self.registry.release_thread(thread);

        debug!(dropped, retired, "event loop stopped");
    }

    fn dispatch(&self, item: Arc<dyn Runnable>, thread: ThreadId) {
        let context = item.context().clone();

        let outcome = match self.registry.bind(&context, thread) {
            Ok(_guard) => item.run(),
            Err(err) => {
                error!(context = %context.id(), "refusing to run work item: {err}");
                Err(Failure::new(format!("binding conflict: {err}")))
            }
        };

        if let Err(failure) = outcome {
            failure::report(self.failures.as_ref(), failure);
        }
    }
}
