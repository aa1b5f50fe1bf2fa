//! Timer queue: ordered, cancellable deadlines.
//!
//! Tasks are keyed by `(deadline, sequence)`, so tasks with equal deadlines
//! pop in the order they were scheduled.

use std::collections::BTreeMap;
use std::time::Duration;

/// Handle to a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey {
    deadline: Duration,
    seq: u64,
}

impl TimerKey {
    /// When the task is due.
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Ordered set of pending tasks.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    tasks: BTreeMap<TimerKey, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` at an absolute deadline.
    pub fn schedule_at(&mut self, deadline: Duration, task: T) -> TimerKey {
        let key = TimerKey {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.tasks.insert(key, task);
        key
    }

    /// Schedule `task` to run `delay` after `now`.
    pub fn schedule_after(&mut self, now: Duration, delay: Duration, task: T) -> TimerKey {
        self.schedule_at(now.saturating_add(delay), task)
    }

    /// Cancel a task. Returns it if it was still pending.
    pub fn cancel(&mut self, key: TimerKey) -> Option<T> {
        self.tasks.remove(&key)
    }

    /// Remove and return the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerKey, T)> {
        let entry = self.tasks.first_entry()?;
        if entry.key().deadline > now {
            return None;
        }
        let key = *entry.key();
        Some((key, entry.remove()))
    }

    /// Deadline of the earliest pending task.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks.keys().next().map(TimerKey::deadline)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
