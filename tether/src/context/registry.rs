use super::{ContextId, ExecutionContext};
use crate::failure::Failure;
use crate::runtime::event_loop::EventLoop;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use thiserror::Error;

/// A binding request that the registry refused.
///
/// Binding conflicts are fatal to the work item that caused them and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("{context} is pinned to thread {owner:?}, cannot bind it on {thread:?}")]
    ForeignThread {
        context: ContextId,
        owner: ThreadId,
        thread: ThreadId,
    },

    #[error("thread {thread:?} is already running {active}, cannot bind {requested}")]
    ThreadOccupied {
        thread: ThreadId,
        active: ContextId,
        requested: ContextId,
    },

    #[error("{context} is not registered or was retired")]
    Unregistered { context: ContextId },
}

/// The calling code is not running where it was expected to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AffinityViolation {
    #[error("{context} belongs to thread {expected:?}, but the caller runs on {actual:?}")]
    WrongThread {
        context: ContextId,
        expected: ThreadId,
        actual: ThreadId,
    },

    #[error("expected {expected} to be active, found {}", display_current(.actual))]
    WrongContext {
        expected: ContextId,
        actual: Option<ContextId>,
    },
}

fn display_current(actual: &Option<ContextId>) -> String {
    match actual {
        Some(id) => id.to_string(),
        None => "no context".to_owned(),
    }
}

impl From<AffinityViolation> for Failure {
    #[track_caller]
    fn from(violation: AffinityViolation) -> Self {
        Failure::new(violation.to_string())
    }
}

#[derive(Default)]
struct RegistryState {
    pins: HashMap<ContextId, ThreadId>,
    active: HashMap<ThreadId, ExecutionContext>,
    /// Loop threads that stopped; nothing is pinned to them anymore.
    released: HashSet<ThreadId>,
}

/// Which context runs on which thread.
///
/// Each runtime owns one registry and shares it behind an `Arc`. Event
/// loops bind a context around every work item they run; everyone else
/// only reads.
///
/// A context stays registered while any handle to it is alive and its
/// event loop runs.
pub struct ContextRegistry {
    next_id: AtomicU64,
    state: Mutex<RegistryState>,
}

impl ContextRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn next_id(&self) -> ContextId {
        ContextId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a context pinned to `event_loop`'s thread.
    ///
    /// A context created for a loop that already stopped is left
    /// unregistered.
    pub(crate) fn create(self: &Arc<Self>, event_loop: Arc<EventLoop>) -> ExecutionContext {
        let thread = event_loop.thread();
        let context = ExecutionContext::new(self.next_id(), event_loop, Arc::downgrade(self));

        let mut state = self.state.lock();
        if !state.released.contains(&thread) {
            state.pins.insert(context.id(), thread);
        }

        context
    }

    /// Forgets `id`; called when its last handle is dropped.
    pub(crate) fn retire(&self, id: ContextId) {
        self.state.lock().pins.remove(&id);
    }

    /// Marks `context` active on `thread` until the guard is dropped.
    pub(crate) fn bind(
        &self,
        context: &ExecutionContext,
        thread: ThreadId,
    ) -> Result<BindGuard<'_>, BindError> {
        let mut state = self.state.lock();

        match state.pins.get(&context.id()) {
            None => {
                return Err(BindError::Unregistered {
                    context: context.id(),
                });
            }
            Some(&owner) if owner != thread => {
                return Err(BindError::ForeignThread {
                    context: context.id(),
                    owner,
                    thread,
                });
            }
            Some(_) => {}
        }

        if let Some(active) = state.active.get(&thread) {
            return Err(BindError::ThreadOccupied {
                thread,
                active: active.id(),
                requested: context.id(),
            });
        }

        state.active.insert(thread, context.clone());

        Ok(BindGuard {
            registry: self,
            thread,
        })
    }

    /// Retires every context pinned to `thread`.
    ///
    /// Returns the number of contexts retired.
    pub(crate) fn release_thread(&self, thread: ThreadId) -> usize {
        let mut state = self.state.lock();
        let before = state.pins.len();

        state.pins.retain(|_, owner| *owner != thread);
        state.released.insert(thread);
        let active = state.active.remove(&thread);
        let retired = before - state.pins.len();

        // dropping the last handle retires it, which takes the lock again
        drop(state);
        drop(active);

        retired
    }

    /// Returns the context active on the calling thread.
    ///
    /// `None` on threads that are not currently running a work item.
    pub fn current(&self) -> Option<ExecutionContext> {
        self.current_on(thread::current().id())
    }

    /// Returns the context active on `thread`.
    pub fn current_on(&self, thread: ThreadId) -> Option<ExecutionContext> {
        self.state.lock().active.get(&thread).cloned()
    }

    /// Returns `true` while `id` has live handles and its event loop runs.
    pub fn is_registered(&self, id: ContextId) -> bool {
        self.state.lock().pins.contains_key(&id)
    }

    /// Checks that the caller runs on `expected`'s thread with `expected`
    /// active.
    ///
    /// # Errors
    ///
    /// Returns the first mismatch found, thread identity first.
    pub fn assert_affinity(&self, expected: &ExecutionContext) -> Result<(), AffinityViolation> {
        let actual = thread::current().id();

        if actual != expected.thread() {
            return Err(AffinityViolation::WrongThread {
                context: expected.id(),
                expected: expected.thread(),
                actual,
            });
        }

        let current = self.current_on(actual).map(|context| context.id());

        if current != Some(expected.id()) {
            return Err(AffinityViolation::WrongContext {
                expected: expected.id(),
                actual: current,
            });
        }

        Ok(())
    }
}

/// Keeps a context active on a thread; dropping it leaves the context.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct BindGuard<'a> {
    registry: &'a ContextRegistry,
    thread: ThreadId,
}

impl Drop for BindGuard<'_> {
    fn drop(&mut self) {
        let left = self.registry.state.lock().active.remove(&self.thread);
        drop(left);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn context_on(registry: &Arc<ContextRegistry>, thread: ThreadId) -> ExecutionContext {
        registry.create(Arc::new(EventLoop::detached(0, thread)))
    }

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();

        let a = context_on(&registry, here);
        let b = context_on(&registry, here);

        assert_eq!(a.id().as_u64(), 1);
        assert_eq!(b.id().as_u64(), 2);
    }

    #[test]
    fn bind_sets_current_until_the_guard_drops() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        let context = context_on(&registry, here);

        assert!(registry.current().is_none());

        {
            let _guard = registry.bind(&context, here).unwrap();
            assert_eq!(registry.current(), Some(context.clone()));
            assert!(registry.assert_affinity(&context).is_ok());
        }

        assert!(registry.current().is_none());
        assert_eq!(
            registry.assert_affinity(&context),
            Err(AffinityViolation::WrongContext {
                expected: context.id(),
                actual: None,
            })
        );
    }

    #[test]
    fn foreign_thread_binding_is_refused() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        let elsewhere = thread::spawn(|| thread::current().id()).join().unwrap();
        let context = context_on(&registry, elsewhere);

        let err = registry.bind(&context, here).err().unwrap();
        assert_eq!(
            err,
            BindError::ForeignThread {
                context: context.id(),
                owner: elsewhere,
                thread: here,
            }
        );
    }

    #[test]
    fn affinity_from_another_thread_reports_wrong_thread() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        let context = context_on(&registry, here);
        let _guard = registry.bind(&context, here).unwrap();

        let (registry2, context2) = (registry.clone(), context.clone());
        let violation = thread::spawn(move || registry2.assert_affinity(&context2))
            .join()
            .unwrap()
            .unwrap_err();

        assert!(matches!(violation, AffinityViolation::WrongThread { .. }));
        let failure = Failure::from(violation);
        assert!(failure.message().contains(&context.id().to_string()));
    }

    #[test]
    fn retired_contexts_cannot_be_bound() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        let first = context_on(&registry, here);
        let second = context_on(&registry, here);

        assert_eq!(registry.release_thread(here), 2);
        assert!(!registry.is_registered(first.id()));

        assert_eq!(
            registry.bind(&second, here).err(),
            Some(BindError::Unregistered {
                context: second.id()
            })
        );
    }

    #[test]
    fn racing_binds_on_one_thread_yield_one_winner() {
        let registry = Arc::new(ContextRegistry::new());
        let target = thread::current().id();
        let contexts = [context_on(&registry, target), context_on(&registry, target)];
        let attempted = Arc::new(Barrier::new(2));
        let start = Arc::new(Barrier::new(2));

        let handles: Vec<_> = contexts
            .iter()
            .cloned()
            .map(|context| {
                let registry = registry.clone();
                let attempted = attempted.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    let outcome = registry.bind(&context, target);
                    // hold any guard until both binds were attempted
                    attempted.wait();
                    outcome.map(drop)
                })
            })
            .collect();

        let outcomes: Vec<Result<(), BindError>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        let conflict = outcomes.into_iter().find_map(Result::err).unwrap();
        assert!(matches!(conflict, BindError::ThreadOccupied { thread, .. } if thread == target));
        assert!(registry.current_on(target).is_none());
    }

    #[test]
    fn dropping_the_last_handle_retires_the_context() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        let context = context_on(&registry, here);
        let id = context.id();

        let clone = context.clone();
        drop(context);
        assert!(registry.is_registered(id));

        drop(clone);
        assert!(!registry.is_registered(id));

        let next = context_on(&registry, here);
        assert!(next.id() > id);
    }

    #[test]
    fn a_bound_context_outlives_its_other_handles() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        let context = context_on(&registry, here);
        let id = context.id();

        let guard = registry.bind(&context, here).unwrap();
        drop(context);
        assert!(registry.is_registered(id));
        assert_eq!(registry.current().map(|c| c.id()), Some(id));

        drop(guard);
        assert!(registry.current().is_none());
        assert!(!registry.is_registered(id));
    }

    #[test]
    fn contexts_created_after_release_stay_unregistered() {
        let registry = Arc::new(ContextRegistry::new());
        let here = thread::current().id();
        registry.release_thread(here);

        let late = context_on(&registry, here);

        assert!(!registry.is_registered(late.id()));
        assert_eq!(
            registry.bind(&late, here).err(),
            Some(BindError::Unregistered { context: late.id() })
        );
    }
}
