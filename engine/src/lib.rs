//! Core engine for termai: the interactive session state machine.
//!
//! [`App`] owns one session: transcript, attachment sets, the live stream and
//! the draft being typed. It has no terminal dependencies. The frame loop
//! feeds it input, calls [`App::process_stream_events`] once per frame and
//! renders from its accessors.
//!
//! All mutation happens on the caller's thread. The only concurrent piece is
//! the stream worker behind [`ChunkHandle`], which talks to the session by
//! message passing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

mod clipboard;
mod commands;
mod config;
mod input;
mod sequencer;
mod state;

pub use clipboard::{Clipboard, NoClipboard};
pub use commands::{CommandError, CommandSpec, command_specs, help_text};
pub use config::{
    ConfigError, FilesConfig, ProfileConfig, TermaiConfig, UiConfig, config_path, expand_env_vars,
    log_dir,
};
pub use input::{DraftInput, Suggestions};
pub use sequencer::{ChunkHandle, StreamSequencer};
pub use state::{DisplayItem, Notice, NoticeLevel, Phase, SessionSettings};

pub use termai_context::{
    Attachment, AttachmentError, AttachmentKind, AttachmentLoader, Attachments,
    TRANSCRIPT_EXTENSION, TranscriptStore, merge_attachments,
};
pub use termai_providers::{
    self, CompletionGateway, CompletionRequest, GatewayError, OpenAICompatible,
};
pub use termai_types::{Chunk, Message, Profile, Role};

use state::{ActiveStream, SessionState};

const SCROLL_PAGE: u16 = 10;

/// One interactive session.
pub struct App {
    state: SessionState,
    transcript: TranscriptStore,
    attachments: Attachments,
    loader: AttachmentLoader,
    profile: Profile,
    sequencer: StreamSequencer,
    settings: SessionSettings,
    clipboard: Box<dyn Clipboard>,
    /// Where `/save` without arguments writes; set by a successful save or load.
    bound_path: Option<PathBuf>,
    draft: DraftInput,
    suggestions: Suggestions,
    display: Vec<DisplayItem>,
    /// Lines scrolled back from the bottom of the conversation.
    scroll_back: u16,
    should_quit: bool,
    tick: usize,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("phase", &self.phase())
            .field("profile", &self.profile.name)
            .field("messages", &self.transcript.len())
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(
        profile: Profile,
        gateway: Arc<dyn CompletionGateway>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            transcript: TranscriptStore::new(),
            attachments: Attachments::new(),
            loader: AttachmentLoader::new(settings.max_file_size),
            profile,
            sequencer: StreamSequencer::new(gateway),
            settings,
            clipboard: Box::new(NoClipboard),
            bound_path: None,
            draft: DraftInput::default(),
            suggestions: Suggestions::default(),
            display: Vec::new(),
            scroll_back: 0,
            should_quit: false,
            tick: 0,
        }
    }

    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, SessionState::Streaming(_))
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Error(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    #[must_use]
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn bound_path(&self) -> Option<&Path> {
        self.bound_path.as_deref()
    }

    #[must_use]
    pub fn draft(&self) -> &DraftInput {
        &self.draft
    }

    #[must_use]
    pub fn suggestions(&self) -> &Suggestions {
        &self.suggestions
    }

    #[must_use]
    pub fn display(&self) -> &[DisplayItem] {
        &self.display
    }

    /// Reasoning received so far for the live stream, if shown.
    #[must_use]
    pub fn streaming_thinking(&self) -> Option<&str> {
        match &self.state {
            SessionState::Streaming(active) if self.settings.show_thinking => {
                Some(active.thinking.as_str())
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[must_use]
    pub fn tick_count(&self) -> usize {
        self.tick
    }

    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// Append the configured system context. Not shown on screen.
    pub fn add_system_context(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.transcript.append(Role::System, text, Vec::new());
    }

    /// Attach files as if typed via `/attach`.
    pub fn attach_paths(&mut self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        let report = self.loader.load_all(paths);
        for error in &report.failed {
            self.push_notice(Notice::error(error.to_string()));
        }
        if !report.loaded.is_empty() {
            let count = self.attachments.attach(report.loaded);
            self.push_notice(Notice::success(format!("Attached {count} file(s)")));
        }
    }

    /// Scan `dir` and pin its supported files as context.
    pub fn load_context_dir(&mut self, dir: &Path) -> Result<usize, AttachmentError> {
        let found = self.loader.scan_directory(dir)?;
        let count = self.attachments.add_context(found);
        let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        self.push_notice(Notice::success(format!(
            "Loaded {count} context file(s) from '{}'",
            dir.display()
        )));
        self.attachments.set_context_dir(dir);
        Ok(count)
    }

    /// Load a transcript before the first frame; same rules as `/load`.
    pub fn resume(&mut self, raw_path: &str) {
        let outcome = self.load_transcript_path(raw_path);
        self.render_outcome(outcome);
    }

    // ========================================================================
    // Draft editing
    // ========================================================================

    pub fn insert_char(&mut self, c: char) {
        self.draft.enter_char(c);
        self.on_draft_changed();
    }

    pub fn insert_text(&mut self, text: &str) {
        self.draft.enter_text(text);
        self.on_draft_changed();
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        self.draft.delete_char();
        self.on_draft_changed();
    }

    pub fn delete_forward(&mut self) {
        self.draft.delete_char_forward();
        self.on_draft_changed();
    }

    pub fn delete_word_backwards(&mut self) {
        self.draft.delete_word_backwards();
        self.on_draft_changed();
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
        self.on_draft_changed();
    }

    pub fn cursor_left(&mut self) {
        self.draft.move_cursor_left();
    }

    pub fn cursor_right(&mut self) {
        self.draft.move_cursor_right();
    }

    pub fn cursor_home(&mut self) {
        self.draft.move_cursor_home();
    }

    pub fn cursor_end(&mut self) {
        self.draft.move_cursor_end();
    }

    fn on_draft_changed(&mut self) {
        if matches!(self.state, SessionState::Idle) {
            self.state = SessionState::Composing;
        }
        if self.is_streaming() {
            self.suggestions.close();
        } else {
            self.suggestions
                .refresh(self.draft.text(), command_specs().iter().map(|spec| spec.name));
        }
    }

    // ========================================================================
    // Suggestions
    // ========================================================================

    pub fn suggestion_next(&mut self) {
        self.suggestions.next();
    }

    pub fn suggestion_previous(&mut self) {
        self.suggestions.previous();
    }

    pub fn close_suggestions(&mut self) {
        self.suggestions.close();
    }

    /// Replace the draft with the selected command and close the list.
    pub fn accept_suggestion(&mut self) -> bool {
        match self.suggestions.accept() {
            Some(name) => {
                self.draft.set_text(name);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Scrolling
    // ========================================================================

    pub fn scroll_page_up(&mut self) {
        self.scroll_back = self.scroll_back.saturating_add(SCROLL_PAGE);
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_back = self.scroll_back.saturating_sub(SCROLL_PAGE);
    }

    /// Clamp after rendering, once the real content height is known.
    pub fn clamp_scroll(&mut self, max: u16) {
        self.scroll_back = self.scroll_back.min(max);
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit the draft: commands go to the dispatcher, anything else is sent
    /// as a message.
    pub fn submit(&mut self) {
        let text = self.draft.text().trim();
        if text.is_empty() {
            return;
        }
        if text.starts_with('/') {
            let raw = self.draft.take_text();
            self.suggestions.close();
            self.process_command(raw.trim());
            return;
        }
        let text = text.to_string();
        if self.submit_message(&text) {
            self.draft.clear();
            self.suggestions.close();
        }
    }

    /// Append a user message and start streaming the reply.
    ///
    /// Returns `false` without touching the transcript while a stream is live.
    pub fn submit_message(&mut self, text: &str) -> bool {
        if self.is_streaming() {
            tracing::debug!("Ignoring submission while streaming");
            return false;
        }

        self.transcript.append(Role::User, text, Vec::new());
        self.push_message(self.transcript.len() - 1);

        let request = self.build_request();

        let message_index = match self.transcript.begin_assistant() {
            Ok(index) => index,
            Err(e) => {
                tracing::error!("Cannot open assistant message: {e}");
                self.push_notice(Notice::error(e.to_string()));
                self.state = SessionState::Error(e.to_string());
                return true;
            }
        };
        self.push_message(message_index);
        let display_index = self.display.len() - 1;

        tracing::debug!(
            model = %self.profile.model,
            messages = request.messages.len(),
            "Starting completion stream"
        );
        let handle = self.sequencer.start(request);
        self.state = SessionState::Streaming(ActiveStream {
            handle,
            message_index,
            display_index,
            thinking: String::new(),
        });
        self.scroll_back = 0;
        true
    }

    /// The outgoing request: the whole transcript with attachments merged into
    /// the final user message.
    #[must_use]
    pub fn build_request(&self) -> CompletionRequest {
        let messages = merge_attachments(self.transcript.messages(), self.attachments.all());
        CompletionRequest::streaming(messages, self.profile.sampling)
    }

    // ========================================================================
    // Stream events
    // ========================================================================

    /// Apply every chunk already delivered by the stream worker.
    pub fn process_stream_events(&mut self) {
        loop {
            let chunk = match &mut self.state {
                SessionState::Streaming(active) => match active.handle.try_next() {
                    Some(chunk) => chunk,
                    None => return,
                },
                _ => return,
            };
            if self.apply_chunk(chunk) {
                return;
            }
        }
    }

    /// Wait for the next chunk and apply it. Returns `false` once nothing is
    /// streaming.
    pub async fn pump_stream(&mut self) -> bool {
        let chunk = match &mut self.state {
            SessionState::Streaming(active) => active.handle.next().await,
            _ => return false,
        };
        self.apply_chunk(chunk);
        self.is_streaming()
    }

    /// Returns `true` when the chunk ended the stream.
    fn apply_chunk(&mut self, chunk: Chunk) -> bool {
        if !chunk.thinking.is_empty()
            && self.settings.show_thinking
            && let SessionState::Streaming(active) = &mut self.state
        {
            active.thinking.push_str(&chunk.thinking);
        }

        if !chunk.text.is_empty()
            && let Err(e) = self.transcript.update_last(&chunk.text)
        {
            tracing::error!("Dropping delta: {e}");
            self.finish_stream(Some(e.to_string()));
            return true;
        }

        if let Some(error) = chunk.error {
            self.finish_stream(Some(error));
            return true;
        }
        if chunk.is_final {
            self.finish_stream(None);
            return true;
        }
        false
    }

    fn finish_stream(&mut self, error: Option<String>) {
        let active = match std::mem::replace(&mut self.state, SessionState::Composing) {
            SessionState::Streaming(active) => active,
            other => {
                self.state = other;
                return;
            }
        };

        self.transcript.close_last();
        if let Some(DisplayItem::Message { thinking, .. }) =
            self.display.get_mut(active.display_index)
        {
            *thinking = active.thinking;
        }

        match error {
            Some(error) => {
                tracing::warn!("Stream failed: {error}");
                self.push_notice(Notice::error(format!("Error: {error}")));
                self.state = SessionState::Error(error);
            }
            None => {
                let chars = self
                    .transcript
                    .get(active.message_index)
                    .map_or(0, |m| m.text.chars().count());
                tracing::debug!(chars, "Stream complete");
                if self.settings.auto_clear_attachments {
                    self.attachments.clear_ephemeral();
                }
            }
        }
    }

    /// Drop the live stream, keeping whatever text arrived. Returns whether a
    /// stream was cancelled.
    pub(crate) fn cancel_stream(&mut self) -> bool {
        match std::mem::replace(&mut self.state, SessionState::Composing) {
            SessionState::Streaming(mut active) => {
                active.handle.cancel();
                self.transcript.close_last();
                tracing::debug!("Stream cancelled");
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Ctrl+C: quit from any state, releasing a live stream.
    pub fn force_quit(&mut self) {
        self.cancel_stream();
        self.should_quit = true;
    }

    pub fn request_quit(&mut self) {
        self.force_quit();
    }

    // ========================================================================
    // Screen buffer
    // ========================================================================

    fn push_message(&mut self, index: usize) {
        self.display.push(DisplayItem::Message {
            index,
            thinking: String::new(),
        });
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        self.display.push(DisplayItem::Notice(notice));
    }

    /// Rebuild the screen from the transcript, skipping system messages.
    pub(crate) fn rebuild_display(&mut self) {
        self.display = self
            .transcript
            .messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != Role::System)
            .map(|(index, _)| DisplayItem::Message {
                index,
                thinking: String::new(),
            })
            .collect();
        self.scroll_back = 0;
    }
}
