//! Failure records and their cross-thread aggregation.
//!
//! Event-loop callbacks run on worker threads, where a panic or an error
//! would otherwise be swallowed by the dispatch layer. A [`Failure`] is the
//! value those callbacks report instead: it carries a message, the source
//! location that raised it, the name of the raising thread and a captured
//! backtrace.
//!
//! Failures flow from any number of [`FailureSink`]s into a single
//! [`FailureAggregator`] owned by the verifying thread, which re-raises
//! them one at a time in arrival order.

mod aggregator;

pub use aggregator::{FailureAggregator, FailureSink};

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::thread;

/// A reportable failure raised on some thread.
///
/// `Failure` is cheap to clone: the backtrace is shared.
#[derive(Clone)]
pub struct Failure {
    message: String,
    location: &'static Location<'static>,
    thread: Option<String>,
    trace: Arc<Backtrace>,
    recorded: bool,
}

impl Failure {
    /// Creates a failure attributed to the caller's source location.
    ///
    /// A backtrace is captured according to `RUST_BACKTRACE`.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
            thread: thread::current().name().map(str::to_owned),
            trace: Arc::new(Backtrace::capture()),
            recorded: false,
        }
    }

    /// Builds a failure from a panic payload caught by the dispatch layer.
    #[track_caller]
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "callback panicked".to_owned()
        };

        Self::new(format!("panicked: {message}"))
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the source location that raised the failure.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns the name of the thread that raised the failure, if it had one.
    pub fn thread_name(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    /// Returns the backtrace captured when the failure was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.trace
    }

    /// Returns `true` if this failure already went through
    /// [`FailureSink::record_and_propagate`].
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub(crate) fn into_recorded(mut self) -> Self {
        self.recorded = true;
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.location)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("message", &self.message)
            .field("location", &format_args!("{}", self.location))
            .field("thread", &self.thread)
            .field("recorded", &self.recorded)
            .finish()
    }
}

impl Error for Failure {}

/// Hands a failure escaping the dispatch layer to `sink`, or logs it when
/// the runtime has none.
pub(crate) fn report(sink: Option<&FailureSink>, failure: Failure) {
    match sink {
        Some(sink) => sink.forward(failure),
        None => tracing::error!(
            location = %failure.location(),
            "unhandled failure: {}",
            failure.message()
        ),
    }
}

/// Checks a condition inside a callback, recording and propagating a
/// [`Failure`] when it does not hold.
///
/// The enclosing function must return a `Result` whose error type
/// implements `From<Failure>`. On failure the record lands in `$sink`
/// and the function returns early, so the rest of the callback does
/// not run.
///
/// # Examples
///
/// ```rust,ignore
/// socket.context().execute(move || {
///     tether::verify!(sink, bytes == 5, "expected 5 bytes, got {}", bytes);
///     Ok(())
/// });
/// ```
#[macro_export]
macro_rules! verify {
    ($sink:expr, $cond:expr $(,)?) => {
        $crate::verify!($sink, $cond, "verification failed: {}", ::core::stringify!($cond))
    };
    ($sink:expr, $cond:expr, $($arg:tt)+) => {
        if !$cond {
            return ::core::result::Result::Err(::core::convert::From::from(
                $sink.record_and_propagate($crate::Failure::new(::std::format!($($arg)+))),
            ));
        }
    };
}
