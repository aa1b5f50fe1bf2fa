//! Commands sent to the reveal actor.
//!
//! Outbound traffic reuses [`crate::reveal::RevealEvent`].

use crate::message::{Fragment, MessageId, StructuralFields};
use crate::reveal::RevealConfig;

/// Commands from the transport side to the reveal thread.
#[derive(Debug, Clone)]
pub enum StreamCommand {
    /// Register a message before its first fragment.
    Open {
        /// Message id.
        id: MessageId,
    },

    /// Apply one fragment.
    Ingest {
        /// Message id.
        id: MessageId,
        /// The fragment.
        fragment: Fragment,
    },

    /// The message's stream ended.
    EndStream {
        /// Message id.
        id: MessageId,
        /// Fields applied before flushing.
        final_fields: Option<StructuralFields>,
    },

    /// The message was removed from the view.
    Dispose {
        /// Message id.
        id: MessageId,
    },

    /// The whole view was torn down.
    Reset,

    /// Change pacing for batches scheduled from now on.
    Configure(RevealConfig),

    /// Stop the reveal thread.
    Shutdown,
}
