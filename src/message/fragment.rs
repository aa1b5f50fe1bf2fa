//! Incoming fragments from the transport.

use super::StructuralFields;
use crate::error::RevealError;
use serde::{Deserialize, Serialize};

/// One partial update for a message.
///
/// Wire shape (JSON): `{ "bodyTextDelta"?: string, "structuralFields"?: object }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fragment {
    /// Text appended to the message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text_delta: Option<String>,
    /// Slots replaced immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural_fields: Option<StructuralFields>,
}

impl Fragment {
    /// A fragment carrying only body text.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            body_text_delta: Some(delta.into()),
            structural_fields: None,
        }
    }

    /// A fragment carrying only structural fields.
    pub const fn fields(fields: StructuralFields) -> Self {
        Self {
            body_text_delta: None,
            structural_fields: Some(fields),
        }
    }

    /// Attach structural fields to this fragment.
    #[must_use]
    pub fn with_fields(mut self, fields: StructuralFields) -> Self {
        self.structural_fields = Some(fields);
        self
    }

    /// Parse a fragment from the transport's JSON payload.
    pub fn from_json(payload: &str) -> Result<Self, RevealError> {
        serde_json::from_str(payload).map_err(RevealError::InvalidFragment)
    }

    /// Body delta, treating an empty string as absent.
    pub fn body(&self) -> Option<&str> {
        self.body_text_delta.as_deref().filter(|delta| !delta.is_empty())
    }
}
