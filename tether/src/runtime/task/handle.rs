use super::core::Task;
use super::state::COMPLETED;
use crate::failure::Failure;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll};

/// A handle to a spawned task.
///
/// Awaiting it yields the task's output, or the [`Failure`] captured if
/// the task panicked or could not be scheduled.
///
/// Dropping the `JoinHandle` does **not** cancel the task; it only
/// discards the ability to observe its result.
pub struct JoinHandle<T> {
    task: Arc<Task<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(task: Arc<Task<T>>) -> Self {
        Self { task }
    }

    /// Returns `true` once the task has produced its result.
    pub fn is_finished(&self) -> bool {
        self.task.state.load(Ordering::Acquire) == COMPLETED
    }

    fn take_result(&self) -> Result<T, Failure> {
        self.task
            .result
            .lock()
            .take()
            .unwrap_or_else(|| Err(Failure::new("join handle polled after completion")))
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, Failure>;

    /// The waker is registered **before** re-checking the task state, so a
    /// completion racing with this poll is never missed.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.is_finished() {
            return Poll::Ready(self.take_result());
        }

        self.task.waiters.lock().push(cx.waker().clone());

        if self.is_finished() {
            return Poll::Ready(self.take_result());
        }

        Poll::Pending
    }
}
