//! Session state machine types.

use std::path::PathBuf;

use termai_context::DEFAULT_MAX_FILE_SIZE;

use crate::sequencer::ChunkHandle;

/// The one in-flight completion. Owning it is what makes a session streaming.
#[derive(Debug)]
pub(crate) struct ActiveStream {
    pub(crate) handle: ChunkHandle,
    /// Transcript index of the open assistant message.
    pub(crate) message_index: usize,
    /// Display position of that message.
    pub(crate) display_index: usize,
    pub(crate) thinking: String,
}

#[derive(Debug)]
pub(crate) enum SessionState {
    Idle,
    Composing,
    Streaming(ActiveStream),
    /// Last stream or dispatch failure; input stays usable.
    Error(String),
}

/// Copyable view of [`SessionState`] for renderers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Composing,
    Streaming,
    Error,
}

impl SessionState {
    pub(crate) fn phase(&self) -> Phase {
        match self {
            SessionState::Idle => Phase::Idle,
            SessionState::Composing => Phase::Composing,
            SessionState::Streaming(_) => Phase::Streaming,
            SessionState::Error(_) => Phase::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A line of engine output shown between transcript messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Screen buffer entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayItem {
    /// A transcript message by index, with any reasoning captured while it
    /// streamed.
    Message { index: usize, thinking: String },
    Notice(Notice),
}

/// Values passed in from configuration at startup.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub auto_clear_attachments: bool,
    pub show_thinking: bool,
    pub max_file_size: u64,
    pub conversations_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_clear_attachments: true,
            show_thinking: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            conversations_dir: PathBuf::from(".termai").join("conversations"),
        }
    }
}
