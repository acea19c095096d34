use crate::runtime::task::Runnable;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

struct QueueState {
    items: VecDeque<Arc<dyn Runnable>>,
    shutdown: bool,
}

/// FIFO run queue of a single event loop.
///
/// Any thread may push; only the owning loop pops. The loop parks on the
/// condition variable while the queue is empty.
pub(crate) struct RunQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl RunQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Enqueues a work item and wakes the loop.
    ///
    /// Returns `false` once the queue is shut down; the item is dropped.
    pub(crate) fn push(&self, item: Arc<dyn Runnable>) -> bool {
        let mut state = self.state.lock();

        if state.shutdown {
            return false;
        }

        state.items.push_back(item);
        drop(state);

        self.condvar.notify_one();
        true
    }

    /// Blocks until a work item is available.
    ///
    /// Returns `None` once shutdown was requested; pending items are left
    /// in the queue for [`drain`](Self::drain).
    pub(crate) fn next(&self) -> Option<Arc<dyn Runnable>> {
        let mut state = self.state.lock();

        self.condvar
            .wait_while(&mut state, |s| s.items.is_empty() && !s.shutdown);

        if state.shutdown {
            return None;
        }

        state.items.pop_front()
    }

    /// Refuses further pushes and wakes the loop so it can exit.
    pub(crate) fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.condvar.notify_all();
    }

    /// Removes every item still queued.
    pub(crate) fn drain(&self) -> Vec<Arc<dyn Runnable>> {
        self.state.lock().items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextId, ExecutionContext};
    use crate::failure::Failure;
    use crate::runtime::event_loop::EventLoop;

    use std::sync::Weak;

    struct Noop(ExecutionContext);

    impl Noop {
        fn new() -> Arc<Self> {
            let event_loop = EventLoop::detached(0, std::thread::current().id());
            let context = ExecutionContext::new(ContextId::new(1), Arc::new(event_loop), Weak::new());
            Arc::new(Noop(context))
        }
    }

    impl Runnable for Noop {
        fn context(&self) -> &ExecutionContext {
            &self.0
        }

        fn run(self: Arc<Self>) -> Result<(), Failure> {
            Ok(())
        }
    }

    #[test]
    fn pushes_after_shutdown_are_refused() {
        let queue = RunQueue::new();

        assert!(queue.push(Noop::new()));
        queue.shutdown();

        assert!(!queue.push(Noop::new()));
        assert!(queue.next().is_none());
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn next_wakes_up_on_push_from_another_thread() {
        let queue = Arc::new(RunQueue::new());
        let producer = queue.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            producer.push(Noop::new());
        });

        assert!(queue.next().is_some());
        handle.join().unwrap();
    }
}
