use super::state::{COMPLETED, IDLE, NOTIFIED, QUEUED, RUNNING};
use crate::context::ExecutionContext;
use crate::failure::Failure;

use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;

/// A unit of work an event loop can run.
///
/// Callbacks and spawned futures both go through this trait so a single
/// run queue can hold them. The returned error is forwarded to the
/// runtime's failure sink by the loop.
pub(crate) trait Runnable: Send + Sync {
    /// The context this work item must run under.
    fn context(&self) -> &ExecutionContext;

    fn run(self: Arc<Self>) -> Result<(), Failure>;
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A spawned future pinned to an execution context.
///
/// The task is its own waker: waking it pushes it back onto the run queue
/// of its context's event loop, never onto another loop.
pub(crate) struct Task<T> {
    context: ExecutionContext,

    /// `None` once the future completed or panicked.
    future: Mutex<Option<BoxFuture<T>>>,

    pub(super) result: Mutex<Option<Result<T, Failure>>>,

    pub(super) state: AtomicUsize,

    /// Wakers of join handles awaiting this task.
    pub(super) waiters: Mutex<Vec<Waker>>,
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new<F>(context: ExecutionContext, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            context,
            future: Mutex::new(Some(Box::pin(future))),
            result: Mutex::new(None),
            state: AtomicUsize::new(QUEUED),
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// Polls the future once.
    ///
    /// A panic inside `poll` completes the task with the captured failure,
    /// which is also returned so the loop reports it.
    fn poll_once(self: Arc<Self>) -> Result<(), Failure> {
        let current = self.state.load(Ordering::Acquire);

        if current != QUEUED && current != NOTIFIED {
            return Ok(());
        }

        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.future.lock();
        let Some(future) = slot.as_mut() else {
            return Ok(());
        };

        let poll = panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)));

        match poll {
            Ok(Poll::Pending) => {
                drop(slot);

                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    // woken during the poll
                    self.state.store(QUEUED, Ordering::Release);
                    self.reschedule();
                }

                Ok(())
            }
            Ok(Poll::Ready(value)) => {
                *slot = None;
                drop(slot);

                self.complete(Ok(value));
                Ok(())
            }
            Err(payload) => {
                *slot = None;
                drop(slot);

                let failure = Failure::from_panic(payload);
                self.complete(Err(failure.clone()));
                Err(failure)
            }
        }
    }

    /// Completes a task that will never be polled.
    pub(crate) fn abandon(&self, failure: Failure) {
        self.future.lock().take();
        self.complete(Err(failure));
    }

    fn complete(&self, result: Result<T, Failure>) {
        *self.result.lock() = Some(result);
        self.state.store(COMPLETED, Ordering::Release);

        let waiters = mem::take(&mut *self.waiters.lock());
        for waiter in waiters {
            waiter.wake();
        }
    }

    fn reschedule(self: Arc<Self>) {
        let event_loop = self.context.event_loop().clone();

        // a stopped loop drops the task, and with it the future
        event_loop.schedule(self);
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn run(self: Arc<Self>) -> Result<(), Failure> {
        self.poll_once()
    }
}

impl<T: Send + 'static> Wake for Task<T> {
    fn wake(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.reschedule();
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().wake();
    }
}
