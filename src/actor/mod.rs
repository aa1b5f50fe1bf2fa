//! Actor Model: Runs the reveal engine on its own thread.
//!
//! The engine itself is single-threaded and timer-driven. This module wraps
//! it in an actor fed by crossbeam channels:
//! - **Transport side**: sends [`StreamCommand`]s as fragments arrive
//! - **Reveal thread**: owns the engine, sleeps until the next reveal is due
//! - **Render side**: consumes [`crate::reveal::RevealEvent`]s
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   StreamCommand    ┌──────────────┐
//! │  Transport   │ ─────────────────▶ │              │
//! └──────────────┘                    │ Reveal Thread│
//!                                     │  (engine +   │
//! ┌──────────────┐    RevealEvent     │   timers)    │
//! │   Renderer   │ ◀───────────────── │              │
//! └──────────────┘                    └──────────────┘
//! ```

mod driver;
mod messages;

pub use driver::RevealActor;
pub use messages::StreamCommand;
