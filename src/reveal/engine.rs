//! Reveal engine: the message registry and ingestion entry points.
//!
//! The engine maps message ids to their [`PlaybackState`], routes incoming
//! fragments, and drives the [`Scheduler`] from a [`Clock`]. It is
//! single-threaded: every mutation happens inside one of its methods, and
//! pending reveals only run when the driver calls [`RevealEngine::advance`].
//!
//! # Example
//!
//! ```rust,ignore
//! use reveal::{Fragment, ManualClock, RevealConfig, RevealEngine, RevealEvent};
//!
//! let clock = ManualClock::new();
//! let mut engine = RevealEngine::new(RevealConfig::default(), clock.clone(), Vec::<RevealEvent>::new());
//!
//! engine.open("m1");
//! engine.ingest("m1", Fragment::text("Hello streaming world"))?;
//! clock.advance(std::time::Duration::from_millis(200));
//! engine.advance();
//! engine.end_stream("m1", None)?;
//! ```

use super::config::RevealConfig;
use super::playback::{Phase, PlaybackState, RenderDetails};
use super::scheduler::Scheduler;
use super::sink::RevealSink;
use crate::clock::{Clock, SystemClock};
use crate::error::{RevealError, Result};
use crate::message::{Fragment, MessageId, StructuralFields};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

/// Read-only view of one message.
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    /// Visible prefix of the body.
    pub visible_text: &'a str,
    /// Merged structural fields.
    pub fields: &'a StructuralFields,
    /// Lifecycle phase.
    pub phase: Phase,
}

/// Registry of live messages plus their reveal scheduler.
pub struct RevealEngine<S: RevealSink, C: Clock = SystemClock> {
    clock: C,
    sink: S,
    scheduler: Scheduler,
    states: HashMap<MessageId, PlaybackState>,
    /// Ids disposed in this view, to tell late fragments from unknown ids.
    disposed: HashSet<MessageId>,
    next_generation: u64,
}

impl<S: RevealSink> RevealEngine<S> {
    /// Create an engine driven by wall-clock time.
    pub fn with_system_clock(config: RevealConfig, sink: S) -> Self {
        Self::new(config, SystemClock::new(), sink)
    }
}

impl<S: RevealSink, C: Clock> RevealEngine<S, C> {
    /// Create an engine with an explicit clock.
    pub fn new(config: RevealConfig, clock: C, sink: S) -> Self {
        Self {
            clock,
            sink,
            scheduler: Scheduler::new(config),
            states: HashMap::new(),
            disposed: HashSet::new(),
            next_generation: 1,
        }
    }

    /// Replace the pacing config for batches scheduled from now on.
    pub fn configure(&mut self, config: RevealConfig) {
        self.scheduler.configure(config);
    }

    /// Current pacing config.
    pub const fn config(&self) -> &RevealConfig {
        self.scheduler.config()
    }

    /// Register a message in the `Idle` phase.
    ///
    /// Opening a live id does nothing. Opening a disposed id starts it over
    /// under a new generation.
    pub fn open(&mut self, id: impl Into<MessageId>) {
        let id = id.into();
        if self.states.contains_key(&id) {
            return;
        }
        self.disposed.remove(&id);

        let generation = self.next_generation;
        self.next_generation += 1;
        debug!(message = %id, generation, "Opened message");
        self.states.insert(id.clone(), PlaybackState::new(id, generation));
    }

    /// Apply one fragment to a message.
    ///
    /// Structural fields are merged and reported right away; body text is
    /// tokenized and its new parts scheduled. Returns the number of new
    /// parts. Calls for unknown, completed, or disposed messages change
    /// nothing and return the reason as an error.
    pub fn ingest(&mut self, id: impl Into<MessageId>, fragment: Fragment) -> Result<usize> {
        let id = id.into();
        let now = self.clock.now();
        let state = Self::open_state(&mut self.states, &self.disposed, &id)?;

        if state.phase() == Phase::Idle {
            state.transition(Phase::Streaming);
        }

        if let Some(fields) = &fragment.structural_fields {
            Self::apply_fields(state, fields, &mut self.sink);
        }

        let Some(delta) = fragment.body() else {
            return Ok(0);
        };

        let parts = state.tokenizer.extend(delta);
        let added = state.push_parts(parts);
        if added > 0 {
            self.scheduler.on_parts_available(state, now, &mut self.sink);
        }
        Ok(added)
    }

    /// End a message's stream.
    ///
    /// Applies `final_fields`, flushes held-back text (an unterminated fence
    /// becomes a best-effort block), and reveals every remaining part.
    pub fn end_stream(
        &mut self,
        id: impl Into<MessageId>,
        final_fields: Option<StructuralFields>,
    ) -> Result<()> {
        let id = id.into();
        let state = Self::open_state(&mut self.states, &self.disposed, &id)?;

        if let Some(fields) = &final_fields {
            Self::apply_fields(state, fields, &mut self.sink);
        }

        state.transition(Phase::Flushing);
        let parts = state.tokenizer.finish();
        state.push_parts(parts);
        self.scheduler.flush(state, &mut self.sink);
        state.transition(Phase::Completed);

        self.sink.on_completed(state.id());
        Ok(())
    }

    /// Tear a message down: cancel its timers and forget its state.
    pub fn dispose(&mut self, id: impl Into<MessageId>) -> Result<()> {
        let id = id.into();
        let Some(mut state) = self.states.remove(&id) else {
            return Err(self.missing(id));
        };

        self.scheduler.cancel_all(&mut state);
        state.transition(Phase::Disposed);
        self.disposed.insert(id);
        Ok(())
    }

    /// Dispose every message, as when the owning view is reset.
    ///
    /// Tombstones are dropped too: afterwards every id is unknown, so late
    /// calls for the old view report `UnknownMessage`.
    pub fn reset(&mut self) {
        let ids: Vec<_> = self.states.keys().cloned().collect();
        for id in ids {
            let _ = self.dispose(id);
        }
        self.disposed.clear();
    }

    /// Fire every reveal due at the clock's current time.
    ///
    /// Returns the number of parts revealed.
    pub fn advance(&mut self) -> usize {
        let now = self.clock.now();
        let mut revealed = 0;
        while let Some((key, task)) = self.scheduler.pop_due(now) {
            let Some(state) = self.states.get_mut(&task.message) else {
                continue;
            };
            if self.scheduler.fire(state, key, &task, &mut self.sink) {
                revealed += 1;
            }
        }
        revealed
    }

    /// Clock time of the next pending reveal.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Time left until the next pending reveal (zero if overdue).
    pub fn time_until_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_sub(self.clock.now()))
    }

    /// Number of pending reveals across all messages.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Render counters of a live message.
    pub fn render_details(&self, id: &MessageId) -> Option<RenderDetails> {
        self.states.get(id).map(PlaybackState::render_details)
    }

    /// Visible text and fields of a live message.
    pub fn view(&self, id: &MessageId) -> Option<MessageView<'_>> {
        self.states.get(id).map(|state| MessageView {
            visible_text: state.visible_text(),
            fields: state.fields(),
            phase: state.phase(),
        })
    }

    /// Phase of a message, including disposed ones.
    pub fn phase(&self, id: &MessageId) -> Option<Phase> {
        self.states
            .get(id)
            .map(PlaybackState::phase)
            .or_else(|| self.disposed.contains(id).then_some(Phase::Disposed))
    }

    /// Playback state of a live message.
    pub fn state(&self, id: &MessageId) -> Option<&PlaybackState> {
        self.states.get(id)
    }

    /// Number of live (not disposed) messages.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no message is live.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The output sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    fn open_state<'a>(
        states: &'a mut HashMap<MessageId, PlaybackState>,
        disposed: &HashSet<MessageId>,
        id: &MessageId,
    ) -> Result<&'a mut PlaybackState> {
        let Some(state) = states.get_mut(id) else {
            let err = if disposed.contains(id) {
                RevealError::Disposed(id.clone())
            } else {
                RevealError::UnknownMessage(id.clone())
            };
            warn!(message = %id, error = %err, "Ignoring update");
            return Err(err);
        };

        if !state.is_open() {
            let err = RevealError::StreamClosed {
                id: id.clone(),
                phase: state.phase(),
            };
            warn!(message = %id, error = %err, "Ignoring update");
            return Err(err);
        }
        Ok(state)
    }

    fn apply_fields(state: &mut PlaybackState, update: &StructuralFields, sink: &mut S) {
        if update.is_empty() {
            return;
        }
        let changed = state.fields_mut().merge(update);
        sink.on_fields_changed(state.id(), state.fields(), changed);
    }

    fn missing(&self, id: MessageId) -> RevealError {
        let err = if self.disposed.contains(&id) {
            RevealError::Disposed(id)
        } else {
            RevealError::UnknownMessage(id)
        };
        warn!(error = %err, "Ignoring dispose");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::message::{FieldMask, MessageStatus};
    use crate::reveal::sink::RevealEvent;
    use pretty_assertions::assert_eq;

    type TestEngine = RevealEngine<Vec<RevealEvent>, ManualClock>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn engine(config: RevealConfig) -> (TestEngine, ManualClock) {
        let clock = ManualClock::new();
        (RevealEngine::new(config, clock.clone(), Vec::new()), clock)
    }

    fn id(s: &str) -> MessageId {
        MessageId::from(s)
    }

    fn reveals(engine: &TestEngine) -> Vec<(usize, String)> {
        engine
            .sink()
            .iter()
            .filter_map(|event| match event {
                RevealEvent::Revealed { visible_text, part_index, .. } => {
                    Some((*part_index, visible_text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i} ")).collect()
    }

    #[test]
    fn test_open_starts_idle() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("m");
        assert_eq!(engine.phase(&id("m")), Some(Phase::Idle));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_ingest_unknown_message_is_ignored() {
        let (mut engine, _) = engine(RevealConfig::default());
        let err = engine.ingest("ghost", Fragment::text("boo ")).unwrap_err();
        assert!(matches!(err, RevealError::UnknownMessage(_)));
        assert!(err.is_ignored_call());
        assert!(engine.sink().is_empty());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_pacing_scenario_twenty_words() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        assert_eq!(engine.ingest("m", Fragment::text(words(20))).unwrap(), 20);
        assert_eq!(engine.pending_timers(), 20);

        clock.advance(ms(499));
        engine.advance();
        assert_eq!(engine.render_details(&id("m")).unwrap().revealed_count, 19);

        clock.advance(ms(1));
        engine.advance();
        let details = engine.render_details(&id("m")).unwrap();
        assert_eq!(details.revealed_count, 20);
        assert_eq!(details.pending_timers, 0);
    }

    #[test]
    fn test_pacing_scenario_two_words() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text("a b ")).unwrap();

        clock.advance(ms(50));
        assert_eq!(engine.advance(), 1);
        clock.advance(ms(50));
        assert_eq!(engine.advance(), 1);
        assert_eq!(
            reveals(&engine),
            vec![(0_usize, String::from("a ")), (1, String::from("a b "))]
        );
    }

    #[test]
    fn test_instant_mode_reveals_before_return() {
        let (mut engine, _) = engine(RevealConfig::disabled());
        engine.open("m");
        for delta in ["Hello ", "there, ", "general ", "Kenobi "] {
            engine.ingest("m", Fragment::text(delta)).unwrap();
            let details = engine.render_details(&id("m")).unwrap();
            assert_eq!(details.revealed_count, details.total_parts);
            assert_eq!(engine.pending_timers(), 0);
        }
        assert_eq!(engine.view(&id("m")).unwrap().visible_text, "Hello there, general Kenobi ");
    }

    #[test]
    fn test_fence_is_revealed_as_one_part() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text("Code:\n```rust\nlet x")).unwrap();
        engine.ingest("m", Fragment::text(" = 1;\n")).unwrap();

        clock.advance(ms(1000));
        engine.advance();
        assert_eq!(engine.view(&id("m")).unwrap().visible_text, "Code:\n");
        assert!(engine.render_details(&id("m")).unwrap().has_open_block);

        engine.ingest("m", Fragment::text("```\n")).unwrap();
        clock.advance(ms(50));
        engine.advance();

        assert_eq!(
            engine.view(&id("m")).unwrap().visible_text,
            "Code:\n```rust\nlet x = 1;\n```\n"
        );
        let details = engine.render_details(&id("m")).unwrap();
        assert_eq!(details.total_atomic_blocks, 1);
        assert_eq!(details.total_parts, 2);
        for (_, visible) in reveals(&engine) {
            assert!(visible == "Code:\n" || visible.ends_with("```\n"), "partial block: {visible:?}");
        }
    }

    #[test]
    fn test_end_stream_flushes_everything() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text("one two three")).unwrap();
        engine.end_stream("m", None).unwrap();

        let details = engine.render_details(&id("m")).unwrap();
        assert_eq!(details.phase, Phase::Completed);
        assert_eq!(details.revealed_count, 3);
        assert_eq!(details.pending_timers, 0);
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.view(&id("m")).unwrap().visible_text, "one two three");

        let before = engine.sink().len();
        clock.advance(ms(10_000));
        assert_eq!(engine.advance(), 0);
        assert_eq!(engine.sink().len(), before);
        assert_eq!(engine.sink().last(), Some(&RevealEvent::Completed { id: id("m") }));
    }

    #[test]
    fn test_end_stream_forces_unterminated_fence() {
        let (mut engine, _) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text("```\nnever closed")).unwrap();
        engine.end_stream("m", None).unwrap();

        let details = engine.render_details(&id("m")).unwrap();
        assert_eq!(details.total_atomic_blocks, 1);
        assert!(!details.has_open_block);
        assert_eq!(engine.view(&id("m")).unwrap().visible_text, "```\nnever closed");
    }

    #[test]
    fn test_fragments_after_completion_are_ignored() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("m");
        engine.ingest("m", Fragment::text("done ")).unwrap();
        engine.end_stream("m", None).unwrap();

        let err = engine.ingest("m", Fragment::text("late ")).unwrap_err();
        assert!(matches!(err, RevealError::StreamClosed { phase: Phase::Completed, .. }));
        assert!(engine.end_stream("m", None).is_err());
        assert_eq!(engine.view(&id("m")).unwrap().visible_text, "done ");
    }

    #[test]
    fn test_dispose_cancels_pending_reveals() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text(words(5))).unwrap();
        assert_eq!(engine.pending_timers(), 5);

        engine.dispose("m").unwrap();
        assert_eq!(engine.pending_timers(), 0);

        clock.advance(ms(10_000));
        assert_eq!(engine.advance(), 0);
        assert!(reveals(&engine).is_empty());
        assert_eq!(engine.phase(&id("m")), Some(Phase::Disposed));
    }

    #[test]
    fn test_late_fragment_after_dispose() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("m");
        engine.dispose("m").unwrap();

        let err = engine.ingest("m", Fragment::text("x ")).unwrap_err();
        assert!(matches!(err, RevealError::Disposed(_)));
        assert!(matches!(engine.dispose("m"), Err(RevealError::Disposed(_))));
    }

    #[test]
    fn test_reopen_after_dispose_gets_new_generation() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        let first = engine.state(&id("m")).unwrap().generation();
        engine.ingest("m", Fragment::text("old words here ")).unwrap();
        engine.dispose("m").unwrap();

        engine.open("m");
        let second = engine.state(&id("m")).unwrap().generation();
        assert_ne!(first, second);

        clock.advance(ms(1000));
        engine.advance();
        assert_eq!(engine.view(&id("m")).unwrap().visible_text, "");
    }

    #[test]
    fn test_reset_disposes_everything() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("a");
        engine.open("b");
        engine.ingest("a", Fragment::text("x y z ")).unwrap();
        engine.reset();

        assert!(engine.is_empty());
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.phase(&id("b")), None);
    }

    #[test]
    fn test_reset_forgets_tombstones() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("gone");
        engine.dispose("gone").unwrap();
        engine.open("live");
        assert_eq!(engine.disposed.len(), 1);

        engine.reset();
        assert!(engine.disposed.is_empty());

        let err = engine.ingest("live", Fragment::text("late ")).unwrap_err();
        assert!(matches!(err, RevealError::UnknownMessage(_)));
        assert!(matches!(engine.dispose("gone"), Err(RevealError::UnknownMessage(_))));
        assert!(engine.sink().is_empty());
    }

    #[test]
    fn test_end_stream_unknown_message_is_ignored() {
        let (mut engine, _) = engine(RevealConfig::default());
        let final_fields = StructuralFields::default().with_status(MessageStatus::Success);
        let err = engine.end_stream("ghost", Some(final_fields)).unwrap_err();

        assert!(matches!(err, RevealError::UnknownMessage(_)));
        assert!(engine.is_empty());
        assert!(engine.sink().is_empty());
    }

    #[test]
    fn test_end_stream_after_dispose_is_ignored() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text("pending words ")).unwrap();
        engine.dispose("m").unwrap();

        let final_fields = StructuralFields::default().with_status(MessageStatus::Success);
        let err = engine.end_stream("m", Some(final_fields)).unwrap_err();
        assert!(matches!(err, RevealError::Disposed(_)));

        clock.advance(ms(10_000));
        assert_eq!(engine.advance(), 0);
        assert!(engine.sink().is_empty());
        assert_eq!(engine.phase(&id("m")), Some(Phase::Disposed));
    }

    #[test]
    fn test_fields_after_completion_are_rejected() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("m");
        engine
            .ingest("m", Fragment::fields(StructuralFields::default().with_header("Answer")))
            .unwrap();
        engine.end_stream("m", None).unwrap();
        let before = engine.sink().len();

        let late = StructuralFields::default()
            .with_header("Rewritten")
            .with_status(MessageStatus::Error);
        let err = engine.ingest("m", Fragment::fields(late.clone())).unwrap_err();
        assert!(matches!(err, RevealError::StreamClosed { phase: Phase::Completed, .. }));
        let err = engine.end_stream("m", Some(late)).unwrap_err();
        assert!(matches!(err, RevealError::StreamClosed { phase: Phase::Completed, .. }));

        let view = engine.view(&id("m")).unwrap();
        assert_eq!(view.fields.header.as_deref(), Some("Answer"));
        assert_eq!(view.fields.status, None);
        assert_eq!(engine.sink().len(), before);
    }

    #[test]
    fn test_structural_fields_apply_immediately() {
        let (mut engine, _) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        let fragment = Fragment::text("slow body ")
            .with_fields(StructuralFields::default().with_header("Plan").with_status(MessageStatus::Loading));
        engine.ingest("m", fragment).unwrap();

        let view = engine.view(&id("m")).unwrap();
        assert_eq!(view.visible_text, "");
        assert_eq!(view.fields.header.as_deref(), Some("Plan"));

        match engine.sink().first() {
            Some(RevealEvent::FieldsChanged { changed, .. }) => {
                assert_eq!(*changed, FieldMask::HEADER | FieldMask::STATUS);
            }
            other => panic!("expected fields change first, got {other:?}"),
        }
    }

    #[test]
    fn test_end_stream_applies_final_fields_first() {
        let (mut engine, _) = engine(RevealConfig::new(500, 50));
        engine.open("m");
        engine.ingest("m", Fragment::text("body")).unwrap();
        engine
            .end_stream("m", Some(StructuralFields::default().with_status(MessageStatus::Success)))
            .unwrap();

        let kinds: Vec<_> = engine
            .sink()
            .iter()
            .map(|e| match e {
                RevealEvent::FieldsChanged { .. } => "fields",
                RevealEvent::Revealed { .. } => "reveal",
                RevealEvent::Completed { .. } => "completed",
            })
            .collect();
        assert_eq!(kinds, vec!["fields", "reveal", "completed"]);
        assert_eq!(engine.view(&id("m")).unwrap().fields.status, Some(MessageStatus::Success));
    }

    #[test]
    fn test_empty_fields_are_not_reported() {
        let (mut engine, _) = engine(RevealConfig::default());
        engine.open("m");
        engine.ingest("m", Fragment::fields(StructuralFields::default())).unwrap();
        assert!(engine.sink().is_empty());
        assert_eq!(engine.phase(&id("m")), Some(Phase::Streaming));
    }

    #[test]
    fn test_messages_have_independent_budgets() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        engine.open("a");
        engine.open("b");
        engine.ingest("a", Fragment::text(words(20))).unwrap();
        engine.ingest("b", Fragment::text("x y ")).unwrap();

        clock.advance(ms(100));
        engine.advance();
        assert_eq!(engine.render_details(&id("a")).unwrap().revealed_count, 4);
        assert_eq!(engine.render_details(&id("b")).unwrap().revealed_count, 2);
    }

    #[test]
    fn test_time_until_next() {
        let (mut engine, clock) = engine(RevealConfig::new(500, 50));
        assert_eq!(engine.time_until_next(), None);
        engine.open("m");
        engine.ingest("m", Fragment::text("a ")).unwrap();
        clock.advance(ms(20));
        assert_eq!(engine.time_until_next(), Some(ms(30)));
    }

    #[test]
    fn test_non_positive_config_reveals_immediately() {
        let (mut engine, _) = engine(RevealConfig::new(0, 0));
        engine.open("m");
        engine.ingest("m", Fragment::text("a b ")).unwrap();
        assert_eq!(engine.render_details(&id("m")).unwrap().revealed_count, 2);
    }
}
