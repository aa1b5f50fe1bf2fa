//! Playback state: per-message record of ingested, scheduled, and
//! revealed parts.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──ingest──▶ Streaming ──end_stream──▶ Flushing ──▶ Completed
//!   │                  │                                      │
//!   └──────────────────┴────────────dispose───────────────────┴──▶ Disposed
//! ```

use super::tokenizer::{Part, Tokenizer};
use crate::clock::TimerKey;
use crate::message::{MessageId, StructuralFields};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Lifecycle phase of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Opened, no fragment yet.
    Idle,
    /// Receiving fragments.
    Streaming,
    /// End of stream received, remaining parts being flushed.
    Flushing,
    /// Everything revealed; terminal.
    Completed,
    /// Torn down early; terminal.
    Disposed,
}

impl Phase {
    /// Whether fragments are still accepted.
    pub const fn accepts_fragments(self) -> bool {
        matches!(self, Self::Idle | Self::Streaming)
    }
}

/// Counters exposed to the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderDetails {
    /// Atomic blocks emitted so far (for "block 2 of 5" numbering).
    pub total_atomic_blocks: usize,
    /// Parts currently visible.
    pub revealed_count: usize,
    /// Parts derived so far.
    pub total_parts: usize,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Reveal timers still pending.
    pub pending_timers: usize,
    /// Whether text is held back by an unterminated fence.
    pub has_open_block: bool,
}

/// Reveal timeline of one message.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Timeline {
    /// Clock time of the first scheduled batch.
    pub origin: Option<Duration>,
    /// Offset from `origin` at which the last scheduled part reveals.
    pub last_offset: Duration,
}

/// Per-message playback record.
#[derive(Debug)]
pub struct PlaybackState {
    id: MessageId,
    generation: u64,
    phase: Phase,
    pub(crate) tokenizer: Tokenizer,
    parts: Vec<Part>,
    revealed: usize,
    pub(crate) scheduled_through: usize,
    pub(crate) timeline: Timeline,
    pub(crate) pending: VecDeque<TimerKey>,
    fields: StructuralFields,
}

impl PlaybackState {
    /// Create an idle state for `id` under a fresh generation.
    pub fn new(id: MessageId, generation: u64) -> Self {
        Self {
            id,
            generation,
            phase: Phase::Idle,
            tokenizer: Tokenizer::new(),
            parts: Vec::new(),
            revealed: 0,
            scheduled_through: 0,
            timeline: Timeline::default(),
            pending: VecDeque::new(),
            fields: StructuralFields::default(),
        }
    }

    /// Message id.
    pub const fn id(&self) -> &MessageId {
        &self.id
    }

    /// Generation token captured by this state's timers.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Current phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the stream still accepts fragments.
    pub const fn is_open(&self) -> bool {
        self.phase.accepts_fragments()
    }

    /// All parts derived so far.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of visible parts.
    pub const fn revealed_count(&self) -> usize {
        self.revealed
    }

    /// Number of parts that have a reveal time (or are already visible).
    pub const fn scheduled_through(&self) -> usize {
        self.scheduled_through
    }

    /// Merged structural fields.
    pub const fn fields(&self) -> &StructuralFields {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut StructuralFields {
        &mut self.fields
    }

    /// Text withheld by an unterminated fence.
    pub fn open_block(&self) -> Option<&str> {
        self.tokenizer.open_block()
    }

    /// Visible prefix of the body.
    pub fn visible_text(&self) -> &str {
        let end = self
            .revealed
            .checked_sub(1)
            .and_then(|last| self.parts.get(last))
            .map_or(0, Part::end);
        &self.tokenizer.accumulated()[..end]
    }

    /// Snapshot of the render counters.
    pub fn render_details(&self) -> RenderDetails {
        RenderDetails {
            total_atomic_blocks: self.tokenizer.atomic_blocks(),
            revealed_count: self.revealed,
            total_parts: self.parts.len(),
            phase: self.phase,
            pending_timers: self.pending.len(),
            has_open_block: self.tokenizer.open_block().is_some(),
        }
    }

    /// Append newly derived parts. Returns how many were added.
    pub(crate) fn push_parts(&mut self, parts: Vec<Part>) -> usize {
        let added = parts.len();
        self.parts.extend(parts);
        added
    }

    /// Make the first `count` parts visible.
    ///
    /// Never moves backwards and never past the available parts. Returns
    /// whether anything new became visible.
    pub(crate) fn reveal_through(&mut self, count: usize) -> bool {
        let count = count.min(self.parts.len());
        if count <= self.revealed {
            return false;
        }
        self.revealed = count;
        true
    }

    /// Move to `phase`.
    pub(crate) fn transition(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        debug!(message = %self.id, from = ?self.phase, to = ?phase, "Playback phase change");
        self.phase = phase;
    }
}
