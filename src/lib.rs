//! # Flywheel Reveal
//!
//! A paced "typewriter" reveal engine for streamed agent answers.
//!
//! Answers arrive token by token, in bursts of any size and at any rate.
//! This crate decides which prefix of the answer is visible at any moment,
//! so text unrolls at a steady, readable pace that is decoupled from the
//! network, and fenced code blocks never appear half-formed.
//!
//! ## Core Concepts
//!
//! - **Parts**: body text is cut into words and atomic fenced blocks
//! - **Stack time / max word time**: each new batch of parts is spread over
//!   at most the stack time, with no part waiting longer than the word cap
//! - **Structural fields**: headers, buttons, and file lists bypass the
//!   animation and apply immediately
//! - **Simulated time**: the engine reads a [`Clock`] and never sleeps, so
//!   every timing rule is testable with a [`ManualClock`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use reveal::{Fragment, ManualClock, RevealConfig, RevealEngine, RevealEvent};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut engine = RevealEngine::new(RevealConfig::default(), clock.clone(), Vec::<RevealEvent>::new());
//!
//! engine.open("answer-1");
//! engine.ingest("answer-1", Fragment::text("Streaming tokens arrive "))?;
//! clock.advance(Duration::from_millis(100));
//! engine.advance();
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod clock;
pub mod error;
pub mod message;
pub mod reveal;

// Re-exports for convenience
pub use actor::{RevealActor, StreamCommand};
pub use clock::{Clock, ManualClock, SystemClock, TimerKey, TimerQueue};
pub use error::RevealError;
pub use message::{Button, FieldMask, FileEntry, Fragment, MessageId, MessageStatus, StructuralFields};
pub use reveal::{
    AnimationSpeed, MessageView, Part, PartKind, Phase, RenderDetails, RevealConfig, RevealEngine,
    RevealEvent, RevealSink, Tokenizer,
};
