//! Conversation state that outlives a single request.
//!
//! - [`TranscriptStore`] - ordered, role-tagged history with a line-oriented
//!   text persistence format
//! - [`AttachmentLoader`] - turns files into [`Attachment`]s (image, pdf, text, code)
//! - [`Attachments`] - the ephemeral and context attachment sets of a session
//! - [`merge_attachments`] - folds attachments into the outgoing request
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── transcript: TranscriptStore   (save/load: <role>: <text>\n<separator>\n)
//! └── attachments: Attachments
//!     ├── ephemeral: AttachmentSet  (cleared after send when configured)
//!     └── context: AttachmentSet    (persistent, optional scanned dir)
//! ```

mod attachments;
mod merge;
mod sets;
mod transcript;

pub use attachments::{
    AttachmentError, AttachmentLoader, DEFAULT_MAX_FILE_SIZE, LoadReport, classify,
};
pub use merge::{merge_attachments, render_attachment_block};
pub use sets::{AttachmentSet, Attachments};
pub use termai_types::{Attachment, AttachmentKind};
pub use transcript::{
    RECORD_SEPARATOR, TRANSCRIPT_EXTENSION, TranscriptError, TranscriptStore, parse_transcript,
    read_transcript, serialize_transcript,
};
