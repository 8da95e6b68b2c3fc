//! Slash-command dispatch.
//!
//! Commands run against the current session. Failures come back as a single
//! [`CommandError`] rendered as one error notice; `/attach` and
//! `/context-add` may additionally report per-file failures while still
//! keeping the files that loaded.

use std::fmt::Write as _;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use thiserror::Error;

use termai_context::{TRANSCRIPT_EXTENSION, TranscriptError, read_transcript};

use crate::state::{Notice, SessionState};

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Name as typed, including the leading slash.
    pub name: &'static str,
    pub help_label: &'static str,
    pub description: &'static str,
    pub show_in_help: bool,
}

/// Declaration order is suggestion order.
const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        name: "/help",
        help_label: "/help",
        description: "Show this help",
        show_in_help: true,
    },
    CommandSpec {
        name: "/exit",
        help_label: "/exit or /quit",
        description: "Exit chat",
        show_in_help: true,
    },
    CommandSpec {
        name: "/quit",
        help_label: "/quit",
        description: "Exit chat",
        show_in_help: false,
    },
    CommandSpec {
        name: "/clear",
        help_label: "/clear",
        description: "Clear conversation context",
        show_in_help: true,
    },
    CommandSpec {
        name: "/profile",
        help_label: "/profile",
        description: "Show current profile info",
        show_in_help: true,
    },
    CommandSpec {
        name: "/attach",
        help_label: "/attach <file> [...]",
        description: "Attach one or more files",
        show_in_help: true,
    },
    CommandSpec {
        name: "/files",
        help_label: "/files",
        description: "Show currently attached files",
        show_in_help: true,
    },
    CommandSpec {
        name: "/clear-files",
        help_label: "/clear-files",
        description: "Clear all attached files",
        show_in_help: true,
    },
    CommandSpec {
        name: "/context",
        help_label: "/context",
        description: "Show context files from directory",
        show_in_help: true,
    },
    CommandSpec {
        name: "/context-add",
        help_label: "/context-add <file> [...]",
        description: "Add files to context",
        show_in_help: true,
    },
    CommandSpec {
        name: "/context-remove",
        help_label: "/context-remove <file>",
        description: "Remove file from context",
        show_in_help: true,
    },
    CommandSpec {
        name: "/save",
        help_label: "/save <name> [-d <directory>]",
        description: "Save conversation",
        show_in_help: true,
    },
    CommandSpec {
        name: "/load",
        help_label: "/load <path>",
        description: "Load conversation from file",
        show_in_help: true,
    },
    CommandSpec {
        name: "/cp",
        help_label: "/cp",
        description: "Copy the last response to the clipboard",
        show_in_help: true,
    },
];

#[must_use]
pub fn command_specs() -> &'static [CommandSpec] {
    COMMAND_SPECS
}

#[must_use]
pub fn help_text() -> String {
    let mut out = String::from("Available commands:");
    for spec in COMMAND_SPECS.iter().filter(|spec| spec.show_in_help) {
        let _ = write!(out, "\n  {} - {}", spec.help_label, spec.description);
    }
    out
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Usage(&'static str),
    #[error("file '{0}' not found in context")]
    NotFound(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid directory path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("failed to {action} conversation: {source}")]
    Transcript {
        action: &'static str,
        #[source]
        source: TranscriptError,
    },
    #[error("failed to copy to clipboard: {0}")]
    Clipboard(String),
}

/// Parsed command with its arguments.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Help,
    Quit,
    Clear,
    Profile,
    Attach(Vec<&'a str>),
    Files,
    ClearFiles,
    Context,
    ContextAdd(Vec<&'a str>),
    ContextRemove(String),
    Save { name: Option<&'a str>, dir: Option<&'a str> },
    Load(Option<&'a str>),
    Copy,
    Unknown(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    pub(crate) fn parse(raw: &'a str) -> Self {
        let mut parts = raw.split_whitespace();
        let Some(head) = parts.next() else {
            return Command::Empty;
        };
        let args: Vec<&str> = parts.collect();

        match head {
            "/help" => Command::Help,
            "/exit" | "/quit" => Command::Quit,
            "/clear" => Command::Clear,
            "/profile" => Command::Profile,
            "/attach" => Command::Attach(args),
            "/files" => Command::Files,
            "/clear-files" => Command::ClearFiles,
            "/context" => Command::Context,
            "/context-add" => Command::ContextAdd(args),
            "/context-remove" => Command::ContextRemove(args.join(" ")),
            "/save" => Command::Save {
                name: args.first().copied(),
                dir: match args.get(1..) {
                    Some(["-d", dir, ..]) => Some(*dir),
                    _ => None,
                },
            },
            "/load" => Command::Load(args.first().copied()),
            "/cp" => Command::Copy,
            other => Command::Unknown(other),
        }
    }
}

fn with_extension(name: &str) -> String {
    let suffix = format!(".{TRANSCRIPT_EXTENSION}");
    if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

impl super::App {
    /// Run one slash command line and render its outcome.
    pub fn process_command(&mut self, raw: &str) {
        let command = Command::parse(raw);
        tracing::debug!(?command, "Dispatching command");
        let outcome = self.run_command(command);
        self.render_outcome(outcome);
    }

    pub(crate) fn render_outcome(&mut self, outcome: Result<(), CommandError>) {
        match outcome {
            Ok(()) => {
                if matches!(self.state, SessionState::Idle | SessionState::Error(_)) {
                    self.state = SessionState::Composing;
                }
            }
            Err(e) => {
                tracing::warn!("Command failed: {e}");
                let message = e.to_string();
                self.push_notice(Notice::error(message.clone()));
                if !self.is_streaming() {
                    self.state = SessionState::Error(message);
                }
            }
        }
    }

    fn run_command(&mut self, command: Command<'_>) -> Result<(), CommandError> {
        match command {
            Command::Help => {
                self.push_notice(Notice::info(help_text()));
            }
            Command::Quit => self.request_quit(),
            Command::Clear => {
                self.cancel_stream();
                self.transcript.clear();
                self.display.clear();
                self.scroll_back = 0;
                self.push_notice(Notice::success("Conversation context cleared"));
            }
            Command::Profile => {
                let profile = &self.profile;
                let sampling = profile.sampling;
                let mut info = format!(
                    "Current Profile: {}\nProvider: {}\nModel: {}\nEndpoint: {}\nTemperature: {:.2}\nMax Tokens: {}",
                    profile.name,
                    profile.provider,
                    profile.model,
                    profile.endpoint,
                    sampling.temperature,
                    sampling.max_tokens,
                );
                if let Some(top_p) = sampling.top_p {
                    let _ = write!(info, "\nTop P: {top_p:.2}");
                }
                self.push_notice(Notice::info(info));
            }
            Command::Attach(paths) => {
                if paths.is_empty() {
                    return Err(CommandError::Usage(
                        "/attach requires at least one file path",
                    ));
                }
                let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
                self.attach_paths(&paths);
            }
            Command::Files => {
                let set = self.attachments.ephemeral();
                if set.is_empty() {
                    self.push_notice(Notice::info("No files currently attached"));
                } else {
                    let mut info = format!("Attached files ({}):", set.len());
                    for file in set {
                        let _ = write!(info, "\n  • {} ({})", file.name, file.kind);
                    }
                    self.push_notice(Notice::info(info));
                }
            }
            Command::ClearFiles => {
                let count = self.attachments.clear_ephemeral();
                self.push_notice(Notice::success(format!("Cleared {count} attached file(s)")));
            }
            Command::Context => {
                let set = self.attachments.context();
                if set.is_empty() {
                    self.push_notice(Notice::info("No context files loaded"));
                } else {
                    let mut info = match self.attachments.context_dir() {
                        Some(dir) => format!("Context: {} ({} files)", dir.display(), set.len()),
                        None => format!("Context ({} files)", set.len()),
                    };
                    info.push_str("\nFiles:");
                    for file in set {
                        let _ = write!(info, "\n  • {} ({})", file.name, file.kind);
                    }
                    self.push_notice(Notice::info(info));
                }
            }
            Command::ContextAdd(paths) => {
                if paths.is_empty() {
                    return Err(CommandError::Usage(
                        "/context-add requires at least one file path",
                    ));
                }
                let report = self.loader.load_all(&paths);
                for error in &report.failed {
                    self.push_notice(Notice::error(error.to_string()));
                }
                if !report.loaded.is_empty() {
                    let count = self.attachments.add_context(report.loaded);
                    self.push_notice(Notice::success(format!("Added {count} file(s) to context")));
                }
            }
            Command::ContextRemove(name) => {
                if name.is_empty() {
                    return Err(CommandError::Usage("/context-remove requires a filename"));
                }
                if self.attachments.remove_context(&name).is_none() {
                    return Err(CommandError::NotFound(name));
                }
                self.push_notice(Notice::success(format!("Removed '{name}' from context")));
            }
            Command::Save { name, dir } => self.save_command(name, dir)?,
            Command::Load(path) => self.load_command(path)?,
            Command::Copy => {
                let Some(text) = self.transcript.last_assistant_text() else {
                    return Ok(());
                };
                if text.is_empty() {
                    return Ok(());
                }
                let text = text.to_string();
                self.clipboard
                    .set_text(&text)
                    .map_err(CommandError::Clipboard)?;
                self.push_notice(Notice::success("Copied last response to clipboard"));
            }
            Command::Unknown(name) => {
                return Err(CommandError::UnknownCommand(name.to_string()));
            }
            Command::Empty => {}
        }
        Ok(())
    }

    fn save_command(&mut self, name: Option<&str>, dir: Option<&str>) -> Result<(), CommandError> {
        let Some(name) = name else {
            let Some(path) = self.bound_path.clone() else {
                return Err(CommandError::Usage("/save requires a conversation name"));
            };
            self.write_transcript(&path)?;
            self.push_notice(Notice::success(format!(
                "Conversation saved successfully to '{}'",
                path.display()
            )));
            return Ok(());
        };

        let dir = match dir {
            Some(dir) => {
                let dir = absolutize(PathBuf::from(dir));
                if !dir.is_dir() {
                    return Err(CommandError::InvalidPath(dir));
                }
                dir
            }
            None => self.settings.conversations_dir.clone(),
        };
        let path = dir.join(with_extension(name));

        self.write_transcript(&path)?;
        self.push_notice(Notice::success(format!(
            "Conversation '{name}' saved successfully"
        )));
        self.bound_path = Some(path);
        Ok(())
    }

    fn write_transcript(&self, path: &Path) -> Result<(), CommandError> {
        self.transcript
            .save(path)
            .map_err(|source| CommandError::Transcript {
                action: "save",
                source,
            })
    }

    fn load_command(&mut self, raw: Option<&str>) -> Result<(), CommandError> {
        let Some(raw) = raw else {
            return Err(CommandError::Usage("/load requires a conversation file path"));
        };
        self.load_transcript_path(raw)
    }

    /// Resolve `raw` like `/load` does and replace the transcript with it.
    ///
    /// The file is read before anything changes: a failed load leaves the
    /// transcript and any live stream alone.
    pub(crate) fn load_transcript_path(&mut self, raw: &str) -> Result<(), CommandError> {
        let file = with_extension(raw);
        let bare_name = !Path::new(&file).is_absolute() && !file.contains(MAIN_SEPARATOR);
        let path = if bare_name {
            self.settings.conversations_dir.join(&file)
        } else {
            PathBuf::from(&file)
        };
        let path = absolutize(path);

        let messages = read_transcript(&path).map_err(|source| CommandError::Transcript {
            action: "load",
            source,
        })?;
        let count = messages.len();

        self.cancel_stream();
        self.transcript.replace(messages);
        self.rebuild_display();
        self.push_notice(Notice::success(format!(
            "Conversation loaded from '{}', {count} messages",
            path.display()
        )));
        self.bound_path = Some(path);
        Ok(())
    }
}
