//! Reveal scheduler: assigns reveal times to new parts and fires them.
//!
//! Every batch of `D` new parts gets a per-part delay of
//! `min(max_word_time, stack_time / D)`. The batch continues the message's
//! timeline: its first part reveals one delay after the previous batch's
//! last part, so the pace never resets on fragment arrival. When the
//! previous timeline has already run out, the batch starts from now.
//!
//! Each timer carries the generation of the state it was scheduled for; a
//! timer that fires for a different generation does nothing.

use super::config::RevealConfig;
use super::playback::PlaybackState;
use super::sink::RevealSink;
use crate::clock::{TimerKey, TimerQueue};
use crate::message::MessageId;
use std::time::Duration;
use tracing::{debug, trace};

/// A pending reveal of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealTask {
    /// Message the part belongs to.
    pub message: MessageId,
    /// Generation the task was scheduled under.
    pub generation: u64,
    /// Index of the part to reveal.
    pub part_index: usize,
}

/// Paces reveals for every live message.
#[derive(Debug, Default)]
pub struct Scheduler {
    config: RevealConfig,
    queue: TimerQueue<RevealTask>,
}

impl Scheduler {
    /// Create a scheduler with the given config.
    pub fn new(config: RevealConfig) -> Self {
        Self {
            config,
            queue: TimerQueue::new(),
        }
    }

    /// Config applied to the next batch.
    pub const fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// Replace the config. Already scheduled parts keep their times.
    pub fn configure(&mut self, config: RevealConfig) {
        debug!(?config, "Reveal config updated");
        self.config = config;
    }

    /// Schedule every part of `state` that has no reveal time yet.
    ///
    /// With a zero per-part delay the batch, and anything still pending
    /// before it, is revealed before this returns.
    pub fn on_parts_available(
        &mut self,
        state: &mut PlaybackState,
        now: Duration,
        sink: &mut impl RevealSink,
    ) {
        let total = state.parts().len();
        let batch = total.saturating_sub(state.scheduled_through);
        if batch == 0 {
            return;
        }

        let per_part = self.config.per_part_time(batch);
        if per_part.is_zero() {
            self.cancel_pending(state);
            for index in state.revealed_count()..total {
                if state.reveal_through(index + 1) {
                    sink.on_reveal(state.id(), state.visible_text(), index);
                }
            }
            state.scheduled_through = total;
            trace!(message = %state.id(), parts = batch, "Revealed batch immediately");
            return;
        }

        let origin = *state.timeline.origin.get_or_insert(now);
        let elapsed = now.saturating_sub(origin);
        let mut offset = state.timeline.last_offset.max(elapsed);
        let start = offset;

        for part_index in state.scheduled_through..total {
            offset += per_part;
            let task = RevealTask {
                message: state.id().clone(),
                generation: state.generation(),
                part_index,
            };
            let key = self.queue.schedule_after(origin, offset, task);
            state.pending.push_back(key);
        }

        state.timeline.last_offset = offset;
        state.scheduled_through = total;

        debug!(
            message = %state.id(),
            parts = batch,
            per_part_ms = per_part.as_secs_f64() * 1000.0,
            start_ms = start.as_millis(),
            end_ms = offset.as_millis(),
            "Scheduled reveal batch"
        );
    }

    /// Remove the earliest task due at `now`, if any.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerKey, RevealTask)> {
        self.queue.pop_due(now)
    }

    /// Run a fired task against the state it was scheduled for.
    ///
    /// Returns whether a part was revealed.
    pub fn fire(
        &mut self,
        state: &mut PlaybackState,
        key: TimerKey,
        task: &RevealTask,
        sink: &mut impl RevealSink,
    ) -> bool {
        if task.generation != state.generation() {
            trace!(message = %task.message, generation = task.generation, "Stale reveal timer");
            return false;
        }

        if state.pending.front() == Some(&key) {
            state.pending.pop_front();
        } else {
            state.pending.retain(|pending| *pending != key);
        }

        if !state.reveal_through(task.part_index + 1) {
            return false;
        }
        trace!(message = %state.id(), part = task.part_index, "Revealed part");
        sink.on_reveal(state.id(), state.visible_text(), task.part_index);
        true
    }

    /// Cancel pending timers and reveal every available part.
    pub fn flush(&mut self, state: &mut PlaybackState, sink: &mut impl RevealSink) {
        self.cancel_pending(state);
        let total = state.parts().len();
        state.scheduled_through = total;
        if state.reveal_through(total) {
            sink.on_reveal(state.id(), state.visible_text(), total - 1);
        }
        debug!(message = %state.id(), parts = total, "Flushed playback");
    }

    /// Cancel pending timers without revealing anything.
    pub fn cancel_all(&mut self, state: &mut PlaybackState) {
        let canceled = self.cancel_pending(state);
        debug!(message = %state.id(), canceled, "Canceled reveal timers");
    }

    /// Deadline of the earliest pending reveal across all messages.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.next_deadline()
    }

    /// Number of pending reveals across all messages.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn cancel_pending(&mut self, state: &mut PlaybackState) -> usize {
        let mut canceled = 0;
        for key in state.pending.drain(..) {
            if self.queue.cancel(key).is_some() {
                canceled += 1;
            }
        }
        canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reveal::sink::RevealEvent;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn state_with(text: &str) -> PlaybackState {
        let mut state = PlaybackState::new(MessageId::from("m"), 1);
        let parts = state.tokenizer.extend(text);
        state.push_parts(parts);
        state
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i} ")).collect()
    }

    fn deadlines(scheduler: &mut Scheduler) -> Vec<Duration> {
        std::iter::from_fn(|| scheduler.pop_due(Duration::MAX).map(|(k, _)| k.deadline())).collect()
    }

    #[test]
    fn test_batch_paced_by_stack_time() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with(&words(20));
        let mut sink = Vec::<RevealEvent>::new();

        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        let times = deadlines(&mut scheduler);
        assert_eq!(times.len(), 20);
        assert_eq!(times[0], ms(25));
        assert_eq!(times[19], ms(500));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_batch_paced_by_word_cap() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b ");
        let mut sink = Vec::<RevealEvent>::new();

        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        assert_eq!(deadlines(&mut scheduler), vec![ms(50), ms(100)]);
    }

    #[test]
    fn test_next_batch_continues_timeline() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        let parts = state.tokenizer.extend("c d e f ");
        state.push_parts(parts);
        scheduler.on_parts_available(&mut state, ms(10), &mut sink);

        let times = deadlines(&mut scheduler);
        assert_eq!(times, vec![ms(50), ms(100), ms(150), ms(200), ms(250), ms(300)]);
        assert_eq!(state.scheduled_through(), 6);
    }

    #[test]
    fn test_idle_gap_restarts_from_now() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);
        deadlines(&mut scheduler);

        let parts = state.tokenizer.extend("b ");
        state.push_parts(parts);
        scheduler.on_parts_available(&mut state, ms(1000), &mut sink);

        assert_eq!(deadlines(&mut scheduler), vec![ms(1050)]);
    }

    #[test]
    fn test_config_change_is_not_retroactive() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        scheduler.configure(RevealConfig::new(100, 10));
        let parts = state.tokenizer.extend("c ");
        state.push_parts(parts);
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        assert_eq!(deadlines(&mut scheduler), vec![ms(50), ms(100), ms(110)]);
    }

    #[test]
    fn test_instant_config_reveals_synchronously() {
        let mut scheduler = Scheduler::new(RevealConfig::disabled());
        let mut state = state_with("a b c ");
        let mut sink = Vec::<RevealEvent>::new();

        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        assert_eq!(state.revealed_count(), 3);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.last(),
            Some(&RevealEvent::Revealed {
                id: MessageId::from("m"),
                visible_text: "a b c ".into(),
                part_index: 2,
            })
        );
    }

    #[test]
    fn test_instant_batch_reveals_earlier_pending_first() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        scheduler.configure(RevealConfig::new(0, 50));
        let parts = state.tokenizer.extend("c ");
        state.push_parts(parts);
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        assert_eq!(state.revealed_count(), 3);
        assert_eq!(scheduler.pending(), 0);
        assert!(state.pending.is_empty());
        let indices: Vec<_> = sink
            .iter()
            .filter_map(|e| match e {
                RevealEvent::Revealed { part_index, .. } => Some(*part_index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_fire_reveals_in_order() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        let (key, task) = scheduler.pop_due(ms(50)).unwrap();
        assert!(scheduler.fire(&mut state, key, &task, &mut sink));
        assert_eq!(state.visible_text(), "a ");
        assert!(scheduler.pop_due(ms(50)).is_none());
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn test_stale_generation_is_noop() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);
        let (key, task) = scheduler.pop_due(ms(50)).unwrap();

        // Same id, reopened under a newer generation.
        let mut replacement = PlaybackState::new(MessageId::from("m"), 2);
        let parts = replacement.tokenizer.extend("a ");
        replacement.push_parts(parts);

        assert!(!scheduler.fire(&mut replacement, key, &task, &mut sink));
        assert_eq!(replacement.revealed_count(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_flush_reveals_everything_and_clears_timers() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b c d e ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);

        scheduler.flush(&mut state, &mut sink);

        assert_eq!(state.revealed_count(), 5);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(sink.len(), 1);
        assert_eq!(scheduler.pop_due(Duration::MAX), None);
    }

    #[test]
    fn test_cancel_all_keeps_revealed_count() {
        let mut scheduler = Scheduler::new(RevealConfig::new(500, 50));
        let mut state = state_with("a b c ");
        let mut sink = Vec::<RevealEvent>::new();
        scheduler.on_parts_available(&mut state, ms(0), &mut sink);
        let (key, task) = scheduler.pop_due(ms(50)).unwrap();
        scheduler.fire(&mut state, key, &task, &mut sink);

        scheduler.cancel_all(&mut state);

        assert_eq!(state.revealed_count(), 1);
        assert_eq!(scheduler.pending(), 0);
    }
}
