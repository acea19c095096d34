use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::task::Waker;
use std::time::Instant;

/// A pending wake-up in the reactor's timer heap.
pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,
    pub(crate) waker: Waker,

    /// Set by the owning `Sleep` when it is dropped early.
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.eq(&other.deadline)
    }
}

impl Ord for TimerEntry {
    /// Reversed, so a `BinaryHeap<TimerEntry>` pops the earliest deadline
    /// first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BinaryHeap;
    use std::task::Waker;
    use std::time::Duration;

    fn entry(deadline: Instant) -> TimerEntry {
        TimerEntry {
            deadline,
            waker: Waker::noop().clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn heap_pops_earliest_deadline_first() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();

        heap.push(entry(now + Duration::from_millis(30)));
        heap.push(entry(now + Duration::from_millis(10)));
        heap.push(entry(now + Duration::from_millis(20)));

        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|t| t.deadline.duration_since(now).as_millis())
            .collect();

        assert_eq!(order, [10, 20, 30]);
    }
}
