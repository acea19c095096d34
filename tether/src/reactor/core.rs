use super::command::{Command, Interest};
use super::event::Event;
use super::poller::{Poller, Waker as PollWaker};
use super::timer::TimerEntry;

use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::task::Waker;
use std::thread;
use std::time::Instant;

use tracing::{debug, error};

/// Sending half of the reactor's command channel.
///
/// Every send also wakes the poller, so a command never waits for the
/// next readiness event.
#[derive(Clone)]
pub(crate) struct ReactorHandle {
    sender: Sender<Command>,
    waker: Arc<PollWaker>,
}

impl ReactorHandle {
    /// Returns `false` once the reactor thread is gone.
    pub(crate) fn send(&self, command: Command) -> bool {
        if self.sender.send(command).is_err() {
            return false;
        }

        self.waker.wake();
        true
    }

    pub(crate) fn shutdown(&self) {
        self.send(Command::Shutdown);
    }
}

#[derive(Default)]
struct Registration {
    reader: Option<Waker>,
    writer: Option<Waker>,
}

/// The readiness thread of a runtime.
///
/// It owns the poller, every I/O registration and the timer heap. Event
/// loops talk to it only through [`ReactorHandle`].
pub(crate) struct Reactor {
    receiver: Receiver<Command>,
    poller: Poller,
    events: Vec<Event>,
    timers: BinaryHeap<TimerEntry>,
    io: HashMap<RawFd, Registration>,
}

impl Reactor {
    /// Spawns the reactor thread.
    pub(crate) fn start() -> io::Result<(ReactorHandle, thread::JoinHandle<()>)> {
        let poller = Poller::new()?;
        let (sender, receiver) = channel();

        let handle = ReactorHandle {
            sender,
            waker: poller.waker(),
        };

        let mut reactor = Reactor {
            receiver,
            poller,
            events: Vec::with_capacity(64),
            timers: BinaryHeap::new(),
            io: HashMap::new(),
        };

        let thread = thread::Builder::new()
            .name("tether-reactor".to_owned())
            .spawn(move || {
                debug!("reactor started");

                if let Err(err) = reactor.run() {
                    error!(%err, "reactor failed");
                }

                reactor.wake_all();
                debug!("reactor stopped");
            })?;

        Ok((handle, thread))
    }

    fn run(&mut self) -> io::Result<()> {
        loop {
            loop {
                match self.receiver.try_recv() {
                    Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return Ok(()),
                    Ok(command) => self.apply(command),
                    Err(TryRecvError::Empty) => break,
                }
            }

            let timeout = self
                .timers
                .peek()
                .map(|t| t.deadline.saturating_duration_since(Instant::now()));

            let mut events = mem::take(&mut self.events);
            self.poller.poll(&mut events, timeout)?;

            for event in &events {
                self.dispatch(event);
            }
            self.events = events;

            self.fire_timers();
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register {
                fd,
                interest,
                waker,
            } => {
                let registration = self.io.entry(fd).or_default();

                match interest {
                    Interest::Read => registration.reader = Some(waker),
                    Interest::Write => registration.writer = Some(waker),
                }

                self.arm(fd);
            }
            Command::Deregister { fd } => {
                if self.io.remove(&fd).is_some() {
                    self.poller.remove(fd);
                }
            }
            Command::SetTimer {
                deadline,
                waker,
                cancelled,
            } => {
                self.timers.push(TimerEntry {
                    deadline,
                    waker,
                    cancelled,
                });
            }
            Command::Shutdown => {}
        }
    }

    /// Syncs the poller with the wakers still waiting on `fd`.
    fn arm(&mut self, fd: RawFd) {
        let Some(registration) = self.io.get(&fd) else {
            return;
        };

        let (read, write) = (registration.reader.is_some(), registration.writer.is_some());

        if !read && !write {
            self.io.remove(&fd);
            self.poller.remove(fd);
            return;
        }

        if let Err(err) = self.poller.update(fd, read, write) {
            // let the waiting tasks retry the syscall and see the real error
            debug!(fd, %err, "cannot watch descriptor");

            if let Some(registration) = self.io.remove(&fd) {
                wake(registration);
            }
        }
    }

    fn dispatch(&mut self, event: &Event) {
        let Some(registration) = self.io.get_mut(&event.fd) else {
            return;
        };

        if event.readable {
            if let Some(waker) = registration.reader.take() {
                waker.wake();
            }
        }

        if event.writable {
            if let Some(waker) = registration.writer.take() {
                waker.wake();
            }
        }

        self.arm(event.fd);
    }

    fn fire_timers(&mut self) {
        let now = Instant::now();

        while self.timers.peek().is_some_and(|t| t.deadline <= now) {
            if let Some(timer) = self.timers.pop() {
                if !timer.cancelled.load(Ordering::Acquire) {
                    timer.waker.wake();
                }
            }
        }
    }

    /// Wakes every waiting task so none hangs on a reactor that is gone.
    fn wake_all(&mut self) {
        for (_, registration) in self.io.drain() {
            wake(registration);
        }

        for timer in self.timers.drain() {
            timer.waker.wake();
        }
    }
}

fn wake(registration: Registration) {
    for waker in [registration.reader, registration.writer].into_iter().flatten() {
        waker.wake();
    }
}
