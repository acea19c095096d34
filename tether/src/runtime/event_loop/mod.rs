//! Event loops.
//!
//! Each event loop is one OS thread draining its own [`RunQueue`]. Contexts
//! are pinned to a loop when created, so everything dispatched through a
//! context lands in the same queue and runs sequentially on the same
//! thread.
//!
//! - [`queue`]: the per-loop FIFO and its parking logic,
//! - [`worker`]: the thread body that binds contexts and runs work items.

pub(crate) mod queue;
pub(crate) mod worker;

use crate::runtime::task::Runnable;
use queue::RunQueue;

use std::sync::Arc;
use std::thread::ThreadId;

/// Scheduling handle to one event loop.
pub(crate) struct EventLoop {
    index: usize,
    thread: ThreadId,
    queue: Arc<RunQueue>,
}

impl EventLoop {
    pub(crate) fn new(index: usize, thread: ThreadId, queue: Arc<RunQueue>) -> Self {
        Self {
            index,
            thread,
            queue,
        }
    }

    /// A loop handle whose queue is never drained, pinned to `thread`.
    #[cfg(test)]
    pub(crate) fn detached(index: usize, thread: ThreadId) -> Self {
        Self::new(index, thread, Arc::new(RunQueue::new()))
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Queues a work item; `false` if the loop has stopped.
    pub(crate) fn schedule(&self, item: Arc<dyn Runnable>) -> bool {
        self.queue.push(item)
    }

    pub(crate) fn shutdown(&self) {
        self.queue.shutdown();
    }
}
