use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How an attachment's payload reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Payload is a `data:` URL sent as an image part.
    Image,
    /// Payload is text extracted from a PDF.
    Pdf,
    Text,
    Code,
}

impl AttachmentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Pdf => "pdf",
            AttachmentKind::Text => "text",
            AttachmentKind::Code => "code",
        }
    }

    /// Whether the payload is inlined into the message body.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        !matches!(self, AttachmentKind::Image)
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A processed file ready to merge into an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub kind: AttachmentKind,
    pub payload: String,
    pub source_path: PathBuf,
}

impl Attachment {
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Matches either the display name or the full source path.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.name == needle || self.source_path.as_os_str() == needle
    }
}
