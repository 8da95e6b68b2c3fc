//! Transcript store and its on-disk format.
//!
//! Each message is written as `<role>: <text>\n<separator>\n`. Bodies are
//! verbatim, embedded newlines included; the separator line is the only record
//! boundary. Parsing is tolerant: lines that cannot be attributed to a role
//! outside an open record are skipped with a warning.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use termai_types::{Message, Role};
use termai_utils::atomic_write;

/// Required extension for transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "txt";

/// Record boundary: a line of exactly 50 `=`.
pub const RECORD_SEPARATOR: &str = "==================================================";

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("invalid transcript file '{}': {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },
    #[error("transcript file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid transcript state: {0}")]
    InvalidState(&'static str),
    #[error("transcript I/O failed for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Ordered message history of one session.
///
/// At most one assistant message is "open" (still receiving deltas), and it is
/// always the last element.
#[derive(Debug, Default, Clone)]
pub struct TranscriptStore {
    messages: Vec<Message>,
    open: bool,
}

impl TranscriptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Whether the last message is an assistant message still receiving text.
    #[must_use]
    pub fn has_open_message(&self) -> bool {
        self.open
    }

    pub fn append(&mut self, role: Role, text: impl Into<String>, images: Vec<String>) {
        if self.open {
            tracing::warn!("Appending over an open assistant message; closing it first");
            self.open = false;
        }
        self.messages
            .push(Message::new(role, text).with_images(images));
    }

    /// Append an empty assistant message that will receive streamed deltas.
    pub fn begin_assistant(&mut self) -> Result<usize, TranscriptError> {
        if self.open {
            return Err(TranscriptError::InvalidState(
                "an assistant message is already open",
            ));
        }
        self.messages.push(Message::assistant(String::new()));
        self.open = true;
        Ok(self.messages.len() - 1)
    }

    pub fn update_last(&mut self, delta: &str) -> Result<(), TranscriptError> {
        if !self.open {
            return Err(TranscriptError::InvalidState(
                "last message is not an open assistant message",
            ));
        }
        match self.messages.last_mut() {
            Some(message) if message.role == Role::Assistant => {
                message.text.push_str(delta);
                Ok(())
            }
            _ => Err(TranscriptError::InvalidState(
                "last message is not an open assistant message",
            )),
        }
    }

    /// Mark the open assistant message complete. Returns it, if one was open.
    pub fn close_last(&mut self) -> Option<&Message> {
        if !std::mem::take(&mut self.open) {
            return None;
        }
        self.messages.last()
    }

    /// Text of the most recent assistant message, open or not.
    #[must_use]
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.text.as_str())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.open = false;
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.open = false;
    }

    /// Write every message to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), TranscriptError> {
        let content = serialize_transcript(&self.messages);
        atomic_write(path, content.as_bytes()).map_err(|source| TranscriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), messages = self.messages.len(), "Transcript saved");
        Ok(())
    }

    /// Replace the in-memory history with the contents of `path`.
    ///
    /// On any error the current history is left untouched. Returns the number
    /// of messages loaded.
    pub fn load(&mut self, path: &Path) -> Result<usize, TranscriptError> {
        let messages = read_transcript(path)?;
        let count = messages.len();
        self.replace(messages);
        Ok(count)
    }
}

/// Read and parse a transcript file without touching any store.
pub fn read_transcript(path: &Path) -> Result<Vec<Message>, TranscriptError> {
    let has_extension = path
        .extension()
        .is_some_and(|ext| ext == TRANSCRIPT_EXTENSION);
    if !has_extension {
        return Err(TranscriptError::InvalidFormat {
            path: path.to_path_buf(),
            reason: format!("expected a .{TRANSCRIPT_EXTENSION} file"),
        });
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TranscriptError::NotFound(path.to_path_buf()));
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Err(TranscriptError::InvalidFormat {
                path: path.to_path_buf(),
                reason: "file is not valid UTF-8".to_string(),
            });
        }
        Err(source) => {
            return Err(TranscriptError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let messages = parse_transcript(&content);
    tracing::info!(path = %path.display(), messages = messages.len(), "Transcript loaded");
    Ok(messages)
}

#[must_use]
pub fn serialize_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(message.role.as_str());
        out.push_str(": ");
        out.push_str(&message.text);
        out.push('\n');
        out.push_str(RECORD_SEPARATOR);
        out.push('\n');
    }
    out
}

fn parse_role_line(line: &str) -> Option<(Role, &str)> {
    Role::ALL.into_iter().find_map(|role| {
        let rest = line.strip_prefix(role.as_str())?.strip_prefix(':')?;
        Some((role, rest.strip_prefix(' ').unwrap_or(rest)))
    })
}

/// Parse transcript text. Never fails; unattributable lines are logged and skipped.
///
/// A record still open at EOF (no trailing separator) is kept as a complete
/// message.
#[must_use]
pub fn parse_transcript(content: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<(Role, String)> = None;

    for (index, line) in content.split('\n').enumerate() {
        // CRLF files: the separator carries a `\r`, and so does the body line
        // before it.
        let crlf = line.ends_with('\r');
        let bare = line.strip_suffix('\r').unwrap_or(line);
        if let Some((role, body)) = current.as_mut() {
            if bare == RECORD_SEPARATOR {
                if crlf && body.ends_with('\r') {
                    body.pop();
                }
                messages.push(Message::new(*role, std::mem::take(body)));
                current = None;
            } else {
                body.push('\n');
                body.push_str(line);
            }
            continue;
        }

        if let Some((role, first)) = parse_role_line(line) {
            current = Some((role, first.to_string()));
        } else if !bare.is_empty() {
            tracing::warn!(
                line = index + 1,
                "Skipping transcript line outside of any message record"
            );
        }
    }

    if let Some((role, mut body)) = current {
        if body.ends_with('\n') {
            body.pop();
        }
        tracing::debug!("Transcript ended without a separator; keeping final record");
        messages.push(Message::new(role, body));
    }

    messages
}
