//! Structural fields: the non-animated slots of a message.
//!
//! Every slot is optional in an update. A present slot replaces the stored
//! value wholesale (last write wins); an absent slot leaves it untouched.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of structural slots touched by an update.
    ///
    /// # Example
    /// ```
    /// use reveal::message::FieldMask;
    /// let touched = FieldMask::HEADER | FieldMask::STATUS;
    /// assert!(touched.contains(FieldMask::HEADER));
    /// ```
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldMask: u8 {
        /// Message header line
        const HEADER = 0b0000_0001;
        /// Lifecycle status badge
        const STATUS = 0b0000_0010;
        /// Action buttons
        const BUTTONS = 0b0000_0100;
        /// Attached file list
        const FILE_LIST = 0b0000_1000;
        /// Footer line
        const FOOTER = 0b0001_0000;
    }
}

impl std::fmt::Debug for FieldMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// Status badge shown next to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageStatus {
    /// Nothing to show.
    #[default]
    None,
    /// Answer is still being generated.
    Loading,
    /// Answer finished normally.
    Success,
    /// Answer needs the user's attention.
    Warning,
    /// Generation failed.
    Error,
}

/// An action button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    /// Identifier reported back when the button is clicked.
    pub id: String,
    /// Visible label.
    pub text: String,
    /// Whether the button stays visible after it has been clicked.
    #[serde(default)]
    pub keep_visible: bool,
}

impl Button {
    /// Create a button with the given id and label.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            keep_visible: false,
        }
    }
}

/// One entry of a message's file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Path relative to the workspace root.
    pub path: String,
    /// Whether the file was removed rather than changed.
    #[serde(default)]
    pub deleted: bool,
}

/// Structural slots of a message.
///
/// Used both as the stored state of a message and as an update: in an
/// update, `None` means "leave this slot alone".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuralFields {
    /// Header line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Status badge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    /// Action buttons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
    /// Attached file list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<FileEntry>>,
    /// Footer line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

impl StructuralFields {
    /// Set the header slot.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Set the status slot.
    #[must_use]
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the buttons slot.
    #[must_use]
    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = Some(buttons);
        self
    }

    /// Set the file list slot.
    #[must_use]
    pub fn with_file_list(mut self, files: Vec<FileEntry>) -> Self {
        self.file_list = Some(files);
        self
    }

    /// Set the footer slot.
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Slots present in this value.
    pub fn mask(&self) -> FieldMask {
        let mut mask = FieldMask::empty();
        mask.set(FieldMask::HEADER, self.header.is_some());
        mask.set(FieldMask::STATUS, self.status.is_some());
        mask.set(FieldMask::BUTTONS, self.buttons.is_some());
        mask.set(FieldMask::FILE_LIST, self.file_list.is_some());
        mask.set(FieldMask::FOOTER, self.footer.is_some());
        mask
    }

    /// Whether no slot is present.
    pub fn is_empty(&self) -> bool {
        self.mask().is_empty()
    }

    /// Overwrite every slot present in `update`, returning the touched slots.
    pub fn merge(&mut self, update: &Self) -> FieldMask {
        if let Some(header) = &update.header {
            self.header = Some(header.clone());
        }
        if let Some(status) = update.status {
            self.status = Some(status);
        }
        if let Some(buttons) = &update.buttons {
            self.buttons = Some(buttons.clone());
        }
        if let Some(files) = &update.file_list {
            self.file_list = Some(files.clone());
        }
        if let Some(footer) = &update.footer {
            self.footer = Some(footer.clone());
        }
        update.mask()
    }
}
