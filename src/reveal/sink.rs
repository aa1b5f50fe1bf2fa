//! Output seam towards the rendering collaborator.

use crate::message::{FieldMask, MessageId, StructuralFields};
use crossbeam_channel::Sender;

/// Receives render instructions from the engine.
///
/// Callbacks run synchronously inside engine calls; implementations must
/// not call back into the engine.
pub trait RevealSink {
    /// One more part of `id` became visible.
    ///
    /// `visible_text` is the full visible prefix of the body, and
    /// `part_index` the index of the last revealed part.
    fn on_reveal(&mut self, id: &MessageId, visible_text: &str, part_index: usize);

    /// Structural slots of `id` were replaced. `fields` is the merged state.
    fn on_fields_changed(&mut self, id: &MessageId, fields: &StructuralFields, changed: FieldMask);

    /// The stream of `id` finished and everything is visible.
    fn on_completed(&mut self, _id: &MessageId) {}
}

/// Owned form of a sink callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    /// See [`RevealSink::on_reveal`].
    Revealed {
        /// Message id.
        id: MessageId,
        /// Visible prefix of the body.
        visible_text: String,
        /// Index of the last revealed part.
        part_index: usize,
    },
    /// See [`RevealSink::on_fields_changed`].
    FieldsChanged {
        /// Message id.
        id: MessageId,
        /// Merged structural state.
        fields: StructuralFields,
        /// Slots touched by the update.
        changed: FieldMask,
    },
    /// See [`RevealSink::on_completed`].
    Completed {
        /// Message id.
        id: MessageId,
    },
}

impl RevealEvent {
    /// Message this event belongs to.
    pub const fn id(&self) -> &MessageId {
        match self {
            Self::Revealed { id, .. } | Self::FieldsChanged { id, .. } | Self::Completed { id } => id,
        }
    }
}

/// Records every callback, in order.
impl RevealSink for Vec<RevealEvent> {
    fn on_reveal(&mut self, id: &MessageId, visible_text: &str, part_index: usize) {
        self.push(RevealEvent::Revealed {
            id: id.clone(),
            visible_text: visible_text.to_string(),
            part_index,
        });
    }

    fn on_fields_changed(&mut self, id: &MessageId, fields: &StructuralFields, changed: FieldMask) {
        self.push(RevealEvent::FieldsChanged {
            id: id.clone(),
            fields: fields.clone(),
            changed,
        });
    }

    fn on_completed(&mut self, id: &MessageId) {
        self.push(RevealEvent::Completed { id: id.clone() });
    }
}

/// Forwards callbacks to another thread.
///
/// A disconnected receiver means nobody renders any more; events are
/// dropped.
impl RevealSink for Sender<RevealEvent> {
    fn on_reveal(&mut self, id: &MessageId, visible_text: &str, part_index: usize) {
        let _ = self.send(RevealEvent::Revealed {
            id: id.clone(),
            visible_text: visible_text.to_string(),
            part_index,
        });
    }

    fn on_fields_changed(&mut self, id: &MessageId, fields: &StructuralFields, changed: FieldMask) {
        let _ = self.send(RevealEvent::FieldsChanged {
            id: id.clone(),
            fields: fields.clone(),
            changed,
        });
    }

    fn on_completed(&mut self, id: &MessageId) {
        let _ = self.send(RevealEvent::Completed { id: id.clone() });
    }
}
