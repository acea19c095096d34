use crate::failure::Failure;
use crate::runtime::context::on_event_loop;

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

#[derive(Default)]
struct LatchState {
    outcome: Option<Result<(), Failure>>,
    waiters: Vec<Waker>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<LatchState>,
    condvar: Condvar,
}

/// A one-shot completion signal.
///
/// The latch starts unsettled and is settled exactly once, by whichever
/// thread calls [`settle`](Self::settle) first. Settling wakes every
/// waiter, blocked threads and pending [`settled`](Self::settled) futures
/// alike, and a wait that starts after settlement returns immediately.
///
/// Clones share the same state.
///
/// # Examples
///
/// ```rust,ignore
/// let latch = CompletionLatch::new();
/// server.close(Box::new(latch.handler()));
///
/// assert!(latch.wait(Duration::from_secs(5)), "server did not close");
/// ```
#[derive(Clone, Default)]
pub struct CompletionLatch {
    inner: Arc<Inner>,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settles the latch with `outcome`.
    ///
    /// Returns `true` if this call settled it, `false` if it was already
    /// settled, in which case `outcome` is discarded.
    pub fn settle(&self, outcome: Result<(), Failure>) -> bool {
        let mut state = self.inner.state.lock();

        if state.outcome.is_some() {
            debug!("latch already settled, ignoring");
            return false;
        }

        state.outcome = Some(outcome);
        let waiters = mem::take(&mut state.waiters);
        drop(state);

        self.inner.condvar.notify_all();

        for waiter in waiters {
            waiter.wake();
        }

        true
    }

    /// Settles the latch successfully.
    pub fn complete(&self) -> bool {
        self.settle(Ok(()))
    }

    pub fn is_settled(&self) -> bool {
        self.inner.state.lock().outcome.is_some()
    }

    /// The outcome the latch was settled with, if any.
    pub fn outcome(&self) -> Option<Result<(), Failure>> {
        self.inner.state.lock().outcome.clone()
    }

    /// Blocks until the latch is settled or `timeout` elapses.
    ///
    /// Returns `true` if the latch is settled. A `false` return does not
    /// cancel anything: a later settle still lands, and is visible through
    /// [`is_settled`](Self::is_settled).
    ///
    /// # Panics
    ///
    /// Panics when called on an event-loop thread, where blocking would
    /// stall every context of the loop, including the one expected to
    /// settle the latch. Await [`settled`](Self::settled) there instead.
    pub fn wait(&self, timeout: Duration) -> bool {
        assert!(
            !on_event_loop(),
            "CompletionLatch::wait would block an event loop; await `settled()` instead"
        );

        let mut state = self.inner.state.lock();

        if state.outcome.is_none() {
            self.inner
                .condvar
                .wait_while_for(&mut state, |s| s.outcome.is_none(), timeout);
        }

        state.outcome.is_some()
    }

    /// A future resolving to the outcome once the latch is settled.
    pub fn settled(&self) -> Settled {
        Settled {
            latch: self.clone(),
        }
    }

    /// A closure that completes the latch when called.
    ///
    /// Suitable as the `on_complete` argument of
    /// [`AsyncCloseable::close`](crate::close::AsyncCloseable::close).
    pub fn handler(&self) -> impl FnOnce() + Send + 'static {
        let latch = self.clone();
        move || {
            latch.complete();
        }
    }
}

/// Future returned by [`CompletionLatch::settled`].
pub struct Settled {
    latch: CompletionLatch,
}

impl Future for Settled {
    type Output = Result<(), Failure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.latch.inner.state.lock();

        if let Some(outcome) = state.outcome.clone() {
            return Poll::Ready(outcome);
        }

        if !state.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            state.waiters.push(cx.waker().clone());
        }

        Poll::Pending
    }
}
