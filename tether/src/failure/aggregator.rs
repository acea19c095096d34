use super::Failure;

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

use tracing::{debug, warn};

/// Producer half of a [`FailureAggregator`].
///
/// Sinks are cheap to clone and can be moved to any thread, including
/// event-loop threads. Recording never blocks and never panics: once the
/// aggregator is gone, records are dropped silently.
#[derive(Clone)]
pub struct FailureSink {
    sender: Sender<Failure>,
    pending: Arc<AtomicUsize>,
}

impl FailureSink {
    /// Enqueues a failure.
    pub fn record(&self, failure: Failure) {
        warn!(
            location = %failure.location(),
            thread = failure.thread_name().unwrap_or("<unnamed>"),
            "failure recorded: {}",
            failure.message()
        );

        self.pending.fetch_add(1, Ordering::AcqRel);

        if self.sender.send(failure).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            debug!("failure aggregator dropped; record discarded");
        }
    }

    /// Records a failure and hands it back for immediate propagation.
    ///
    /// The returned failure is marked as recorded, so the dispatch layer
    /// will not enqueue it a second time when the callback returns it.
    pub fn record_and_propagate(&self, failure: Failure) -> Failure {
        let failure = failure.into_recorded();
        self.record(failure.clone());
        failure
    }

    /// Records a failure returned by a callback unless the callback
    /// already recorded it.
    pub(crate) fn forward(&self, failure: Failure) {
        if !failure.is_recorded() {
            self.record(failure);
        }
    }
}

/// Collects failures raised on any thread and re-raises them, in arrival
/// order, on the thread that owns it.
///
/// The aggregator is neither `Send` nor `Sync`, so only the thread that
/// created it can drain it. Producers obtain a [`FailureSink`] through
/// [`sink`](Self::sink).
///
/// # Examples
///
/// ```rust,ignore
/// let failures = FailureAggregator::new();
/// let sink = failures.sink();
///
/// std::thread::spawn(move || sink.record(Failure::new("late reply")))
///     .join()
///     .unwrap();
///
/// assert!(failures.drain_and_raise().is_err());
/// ```
pub struct FailureAggregator {
    sink: FailureSink,
    receiver: Receiver<Failure>,
    _owner: PhantomData<*const ()>,
}

impl FailureAggregator {
    /// Creates an empty aggregator owned by the calling thread.
    pub fn new() -> Self {
        let (sender, receiver) = channel();

        Self {
            sink: FailureSink {
                sender,
                pending: Arc::new(AtomicUsize::new(0)),
            },
            receiver,
            _owner: PhantomData,
        }
    }

    /// Returns a producer handle feeding this aggregator.
    pub fn sink(&self) -> FailureSink {
        self.sink.clone()
    }

    /// Enqueues a failure from the owning thread.
    pub fn record(&self, failure: Failure) {
        self.sink.record(failure);
    }

    /// Records a failure and returns it for propagation.
    pub fn record_and_propagate(&self, failure: Failure) -> Failure {
        self.sink.record_and_propagate(failure)
    }

    /// Removes the oldest pending failure and raises it.
    ///
    /// Returns `Ok(())` when nothing is pending. Remaining failures stay
    /// queued, so repeated calls surface every failure, one per call.
    pub fn drain_and_raise(&self) -> Result<(), Failure> {
        match self.receiver.try_recv() {
            Ok(failure) => {
                self.sink.pending.fetch_sub(1, Ordering::AcqRel);
                Err(failure)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(()),
        }
    }

    /// Returns the number of failures waiting to be drained.
    pub fn len(&self) -> usize {
        self.sink.pending.load(Ordering::Acquire)
    }

    /// Returns `true` if no failure is waiting to be drained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FailureAggregator {
    fn default() -> Self {
        Self::new()
    }
}
