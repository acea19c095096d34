use super::builder::RuntimeBuilder;
use super::context::on_event_loop;
use super::event_loop::EventLoop;
use super::event_loop::queue::RunQueue;
use super::event_loop::worker::Worker;
use super::handle::{Handle, Shared};
use super::task::JoinHandle;
use crate::Error;
use crate::context::{ContextRegistry, ExecutionContext};
use crate::failure::Failure;
use crate::reactor::{Reactor, ReactorHandle};

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, mpsc};
use std::thread;

use tracing::info;

/// The main runtime handle.
///
/// `Runtime` owns:
/// - one reactor thread driving sockets and timers,
/// - `worker_threads` event loops, each pinned to its own OS thread,
/// - the [`ContextRegistry`] shared by all of them.
///
/// Dropping the runtime shuts down all internal components in an orderly
/// fashion and retires every context it created.
pub struct Runtime {
    handle: Handle,
    reactor: ReactorHandle,
    workers: Vec<thread::JoinHandle<()>>,
    reactor_thread: Option<thread::JoinHandle<()>>,
}

impl Runtime {
    /// Starts a runtime with default settings.
    ///
    /// # Errors
    ///
    /// See [`RuntimeBuilder::build`].
    pub fn new_default() -> Result<Self, Error> {
        RuntimeBuilder::new().build()
    }

    pub(crate) fn new(config: RuntimeBuilder) -> Result<Self, Error> {
        let (reactor, reactor_thread) = Reactor::start()?;
        let registry = Arc::new(ContextRegistry::new());

        let mut loops = Vec::with_capacity(config.worker_threads);
        let mut workers = Vec::with_capacity(config.worker_threads);

        for index in 0..config.worker_threads {
            let queue = Arc::new(RunQueue::new());
            let worker = Worker::new(
                index,
                queue.clone(),
                registry.clone(),
                reactor.clone(),
                config.failures.clone(),
            );

            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || worker.run());

            let handle = match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    queue.shutdown();
                    abort_start(&loops, workers, &reactor, reactor_thread);
                    return Err(err.into());
                }
            };

            loops.push(Arc::new(EventLoop::new(index, handle.thread().id(), queue)));
            workers.push(handle);
        }

        info!(worker_threads = config.worker_threads, "runtime started");

        Ok(Self {
            handle: Handle::new(Shared {
                loops,
                next: AtomicUsize::new(0),
                registry,
                failures: config.failures,
            }),
            reactor,
            workers,
            reactor_thread: Some(reactor_thread),
        })
    }

    /// Returns a cloneable handle to this runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Creates a context on the next event loop, round-robin.
    pub fn new_context(&self) -> ExecutionContext {
        self.handle.new_context()
    }

    /// Creates a context pinned to event loop `worker`.
    pub fn context_on(&self, worker: usize) -> ExecutionContext {
        self.handle.context_on(worker)
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        self.handle.registry()
    }

    /// Spawns a future on a fresh context.
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.new_context().spawn(future)
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// The future runs on a fresh context; the calling thread only waits.
    ///
    /// # Errors
    ///
    /// Returns the captured failure if the future panicked, or if the
    /// runtime stopped before it completed.
    ///
    /// # Panics
    ///
    /// Panics if called from an event-loop thread: blocking there would
    /// stall every context of that loop.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async { 42 });
    /// assert_eq!(result.unwrap(), 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> Result<F::Output, Failure>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        assert!(
            !on_event_loop(),
            "block_on cannot be called from an event-loop thread"
        );

        let (transmitter, receiver) = mpsc::channel();
        let context = self.new_context();
        let task = context.spawn(future);

        context.spawn(async move {
            let _ = transmitter.send(task.await);
        });

        receiver
            .recv()
            .unwrap_or_else(|_| Err(Failure::new("runtime stopped before block_on completed")))
    }
}

fn abort_start(
    loops: &[Arc<EventLoop>],
    workers: Vec<thread::JoinHandle<()>>,
    reactor: &ReactorHandle,
    reactor_thread: thread::JoinHandle<()>,
) {
    for event_loop in loops {
        event_loop.shutdown();
    }

    for worker in workers {
        let _ = worker.join();
    }

    reactor.shutdown();
    let _ = reactor_thread.join();
}

impl Drop for Runtime {
    /// Stops the event loops, then the reactor, and joins every thread.
    fn drop(&mut self) {
        self.handle.shutdown_loops();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }

        self.reactor.shutdown();

        if let Some(thread) = self.reactor_thread.take() {
            let _ = thread.join();
        }

        info!("runtime stopped");
    }
}
