use super::Runtime;
use crate::Error;
use crate::failure::FailureSink;

use std::env;
use std::thread;

/// Environment variable read by [`RuntimeBuilder::from_env`].
pub const WORKER_THREADS_ENV: &str = "TETHER_WORKER_THREADS";

/// Builder for configuring and creating a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(4)
///     .thread_name("http-loop")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    pub(super) worker_threads: usize,
    pub(super) thread_name: String,
    pub(super) failures: Option<FailureSink>,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    ///
    /// By default, the number of event loops is set to the number of
    /// available logical CPUs, falling back to `1` if unavailable.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: "tether-loop".to_owned(),
            failures: None,
        }
    }

    /// Starts from the defaults, then applies `TETHER_WORKER_THREADS` if set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the variable is not a positive
    /// integer.
    pub fn from_env() -> Result<Self, Error> {
        let builder = Self::new();

        match env::var(WORKER_THREADS_ENV) {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(builder.worker_threads(n)),
                _ => Err(Error::InvalidConfig(format!(
                    "{WORKER_THREADS_ENV} must be a positive integer, got {raw:?}"
                ))),
            },
            Err(env::VarError::NotPresent) => Ok(builder),
            Err(err) => Err(Error::InvalidConfig(format!("{WORKER_THREADS_ENV}: {err}"))),
        }
    }

    /// Sets the number of event-loop threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Prefix of the event-loop thread names; the loop index is appended.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Where callback errors and panics are sent.
    ///
    /// Without a sink they are only logged.
    pub fn failure_sink(mut self, sink: FailureSink) -> Self {
        self.failures = Some(sink);
        self
    }

    /// Builds the runtime with the configured options.
    ///
    /// This starts the reactor and every event loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the reactor or a thread cannot be created.
    pub fn build(self) -> Result<Runtime, Error> {
        Runtime::new(self)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
