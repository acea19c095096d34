use crate::close::{self, AsyncCloseable, DEFAULT_CLOSE_TIMEOUT};
use crate::context::{ContextRegistry, ExecutionContext};
use crate::failure::{Failure, FailureAggregator, FailureSink};
use crate::runtime::{Handle, Runtime, RuntimeBuilder};
use crate::Error;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly `tracing` subscriber, once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Configures a [`TestHarness`].
pub struct HarnessBuilder {
    name: String,
    worker_threads: Option<usize>,
}

impl HarnessBuilder {
    /// Number of event loops of the harness runtime.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = Some(n);
        self
    }

    /// Starts the runtime and the failure aggregator.
    ///
    /// # Errors
    ///
    /// Fails if the runtime cannot be built.
    pub fn start(self) -> Result<TestHarness, Error> {
        init_tracing();
        info!("*** STARTING TEST {}", self.name);

        let failures = FailureAggregator::new();
        let mut builder = RuntimeBuilder::new()
            .thread_name(format!("{}-loop", self.name))
            .failure_sink(failures.sink());

        if let Some(n) = self.worker_threads {
            builder = builder.worker_threads(n);
        }

        Ok(TestHarness {
            name: self.name,
            runtime: builder.build()?,
            failures,
        })
    }
}

/// A runtime wired to a failure aggregator owned by the test thread.
///
/// Every callback error or panic on any event loop lands in the
/// aggregator, and [`finish`](Self::finish) turns the first of them into
/// a test failure.
///
/// # Examples
///
/// ```rust,ignore
/// let harness = TestHarness::start("echo")?;
/// let server = NetServer::new(harness.handle());
/// // ...
/// harness.await_close(&server)?;
/// harness.finish();
/// ```
pub struct TestHarness {
    name: String,
    runtime: Runtime,
    failures: FailureAggregator,
}

impl TestHarness {
    pub fn builder(name: impl Into<String>) -> HarnessBuilder {
        HarnessBuilder {
            name: name.into(),
            worker_threads: None,
        }
    }

    /// Starts a harness with default settings.
    ///
    /// # Errors
    ///
    /// Fails if the runtime cannot be built.
    pub fn start(name: impl Into<String>) -> Result<Self, Error> {
        Self::builder(name).start()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        self.runtime.registry()
    }

    pub fn new_context(&self) -> ExecutionContext {
        self.runtime.new_context()
    }

    /// A producer handle for callbacks that verify things.
    pub fn sink(&self) -> FailureSink {
        self.failures.sink()
    }

    pub fn failures(&self) -> &FailureAggregator {
        &self.failures
    }

    /// Closes `closeable` and waits up to [`DEFAULT_CLOSE_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// A close that does not complete in time is recorded and returned.
    pub fn await_close<C>(&self, closeable: &C) -> Result<(), Failure>
    where
        C: AsyncCloseable + ?Sized,
    {
        close::await_close(closeable, DEFAULT_CLOSE_TIMEOUT).map_err(|err| {
            self.failures
                .record_and_propagate(Failure::new(format!("close failed: {err}")))
        })
    }

    /// Raises the oldest failure recorded so far, if any.
    pub fn throw_failures(&self) -> Result<(), Failure> {
        self.failures.drain_and_raise()
    }

    /// Records the outcome of a test body that returns a `Result`, then
    /// [`finish`](Self::finish)es.
    pub fn conclude(self, outcome: Result<(), Failure>) {
        if let Err(failure) = outcome {
            self.failures.sink().forward(failure);
        }

        self.finish();
    }

    /// Shuts the runtime down, then fails the test if anything failed.
    ///
    /// # Panics
    ///
    /// Panics with the first pending failure.
    pub fn finish(self) {
        info!("*** STOPPING TEST {}", self.name);

        drop(self.runtime);

        if let Err(failure) = self.failures.drain_and_raise() {
            let remaining = self.failures.len();
            panic!(
                "test {} failed: {failure}{}\n{}",
                self.name,
                if remaining > 0 {
                    format!(" ({remaining} more failure(s) recorded)")
                } else {
                    String::new()
                },
                failure.backtrace()
            );
        }
    }
}
