//! Message model: identity, structural fields, and incoming fragments.
//!
//! A chat message is made of two kinds of content:
//!
//! - **Body text**, which arrives as deltas and is revealed at a paced rate
//!   by the [`crate::reveal`] engine.
//! - **Structural fields** (header, status, buttons, file list, footer),
//!   which replace the matching slot of the message immediately.
//!
//! ```rust,ignore
//! use reveal::message::{Fragment, StructuralFields};
//!
//! let fragment = Fragment::text("Hello ")
//!     .with_fields(StructuralFields::default().with_header("Assistant"));
//! ```

mod fields;
mod fragment;
mod id;

pub use fields::{Button, FieldMask, FileEntry, MessageStatus, StructuralFields};
pub use fragment::Fragment;
pub use id::MessageId;
