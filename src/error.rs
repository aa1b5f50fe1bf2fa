//! Error and diagnostic types.
//!
//! Nothing here is fatal to the engine. Ingestion methods return these as
//! diagnostics for calls that were ignored; the message state is left
//! exactly as it was.

use crate::message::MessageId;
use crate::reveal::Phase;
use thiserror::Error;

/// Errors and ignored-call diagnostics.
#[derive(Error, Debug)]
pub enum RevealError {
    /// The message was never opened in this view.
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    /// The message stream has already ended.
    #[error("message {id} no longer accepts fragments (phase: {phase:?})")]
    StreamClosed {
        /// Message that rejected the call.
        id: MessageId,
        /// Phase the message was in.
        phase: Phase,
    },

    /// The message was disposed.
    #[error("message {0} was disposed")]
    Disposed(MessageId),

    /// A configuration document could not be parsed.
    #[error("invalid reveal config: {0}")]
    InvalidConfig(#[from] toml::de::Error),

    /// A transport payload could not be parsed into a fragment.
    #[error("invalid fragment payload: {0}")]
    InvalidFragment(#[source] serde_json::Error),

    /// The reveal actor thread is no longer running.
    #[error("reveal actor disconnected")]
    ActorDisconnected,
}

impl RevealError {
    /// Whether this is a late or misrouted call that was ignored.
    pub const fn is_ignored_call(&self) -> bool {
        matches!(
            self,
            Self::UnknownMessage(_) | Self::StreamClosed { .. } | Self::Disposed(_)
        )
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = RevealError> = std::result::Result<T, E>;
