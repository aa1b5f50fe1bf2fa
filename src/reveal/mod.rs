//! Incremental answer reveal: the "typewriter" core.
//!
//! Body text arrives as arbitrarily sized, arbitrarily timed deltas. This
//! module decides which prefix of it is visible, and when:
//!
//! 1. The [`Tokenizer`] cuts the accumulated text into parts (words and
//!    atomic fenced blocks), holding back anything incomplete.
//! 2. The [`Scheduler`] spreads each batch of new parts over time, bounded
//!    per part by the max word time and per batch by the stack time.
//! 3. The [`RevealEngine`] keeps one [`PlaybackState`] per message, applies
//!    structural fields instantly, and reports every change to a
//!    [`RevealSink`].
//!
//! # Architecture
//!
//! ```text
//!  transport ──Fragment──▶ RevealEngine ──fields──────────────▶ RevealSink
//!                              │                                   ▲
//!                              ▼                                   │
//!                          Tokenizer ──parts──▶ Scheduler ──timer──┘
//!                                                  ▲
//!                                    Clock ──advance()
//! ```

mod config;
mod engine;
mod playback;
mod scheduler;
mod sink;
mod tokenizer;

pub use config::{AnimationSpeed, RevealConfig};
pub use engine::{MessageView, RevealEngine};
pub use playback::{Phase, PlaybackState, RenderDetails};
pub use scheduler::{RevealTask, Scheduler};
pub use sink::{RevealEvent, RevealSink};
pub use tokenizer::{Part, PartKind, Tokenizer};
