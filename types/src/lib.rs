//! Core domain types for termai.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod attachment;
mod profile;

pub use attachment::{Attachment, AttachmentKind};
pub use profile::{ApiKey, Profile, SamplingParams};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Roles & Messages
// ============================================================================

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::System, Role::User, Role::Assistant];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }

    /// Parse a role tag. Tags are lowercase on the wire and on disk.
    pub fn parse(raw: &str) -> Result<Self, RoleParseError> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == raw)
            .ok_or_else(|| RoleParseError(raw.to_string()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation.
///
/// Text may be empty: an assistant placeholder starts empty and grows as
/// deltas arrive. Images are data URLs and only travel to the gateway; the
/// transcript file format does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// One incremental unit pulled from a completion stream.
///
/// A chunk may carry content and thinking text at the same time. `is_final`
/// and `error` are terminal: nothing is read from a stream after either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub thinking: String,
    pub is_final: bool,
    pub error: Option<String>,
}

impl Chunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self {
            thinking: text.into(),
            ..Self::default()
        }
    }

    /// End-of-stream marker.
    #[must_use]
    pub fn end() -> Self {
        Self {
            is_final: true,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_final || self.error.is_some()
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || !self.thinking.is_empty()
    }
}
