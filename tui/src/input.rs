//! Input handling for the termai TUI.

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;

use termai_engine::App;

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(25); // shutdown responsiveness
const INPUT_CHANNEL_CAPACITY: usize = 1024;
const MAX_EVENTS_PER_FRAME: usize = 64; // never starve rendering

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

enum InputMsg {
    Event(Event),
    Error(String),
}

/// Reads terminal events on a blocking thread and hands them to the frame
/// loop through a bounded channel.
pub struct InputPump {
    rx: mpsc::Receiver<InputMsg>,
    stop: Arc<AtomicBool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl InputPump {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = stop.clone();

        let join = tokio::task::spawn_blocking(move || input_loop(stop2, tx));
        Self {
            rx,
            stop,
            join: Some(join),
        }
    }

    pub async fn shutdown(&mut self) {
        // Close first so a reader blocked on a full channel wakes up.
        self.rx.close();

        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }
    }
}

impl Default for InputPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        self.rx.close();
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: Arc<AtomicBool>, tx: mpsc::Sender<InputMsg>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    // Backpressure instead of dropping: large pastes must arrive whole.
                    if tx.blocking_send(InputMsg::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                break;
            }
        }
    }
}

/// Apply up to one frame's worth of queued input. Returns `true` when the
/// session wants to quit.
pub fn handle_events(app: &mut App, input: &mut InputPump) -> Result<bool> {
    let mut processed = 0;
    while processed < MAX_EVENTS_PER_FRAME {
        let ev = match input.rx.try_recv() {
            Ok(InputMsg::Event(ev)) => ev,
            Ok(InputMsg::Error(msg)) => return Err(anyhow!("input error: {msg}")),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(anyhow!("input pump disconnected"));
            }
        };

        apply_event(app, ev);
        if app.should_quit() {
            return Ok(true);
        }
        processed += 1;
    }
    Ok(app.should_quit())
}

pub(crate) fn apply_event(app: &mut App, event: Event) {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(app, key),
        Event::Paste(text) => app.insert_text(&normalize_line_endings(&text)),
        _ => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    if ctrl && key.code == KeyCode::Char('c') {
        app.force_quit();
        return;
    }

    if app.suggestions().is_open() && handle_suggestion_key(app, key) {
        return;
    }

    match key.code {
        KeyCode::Enter if ctrl || alt => app.submit(),
        KeyCode::Enter => {
            if app.draft().text().starts_with('/') {
                app.submit();
            } else {
                app.insert_newline();
            }
        }
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::PageDown => app.scroll_page_down(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete_forward(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_draft(),
        KeyCode::Char('w') if ctrl => app.delete_word_backwards(),
        KeyCode::Char(c) if !ctrl && c != '\r' => app.insert_char(c),
        _ => {}
    }
}

/// Keys that drive the suggestion list. Returns `false` to fall through to
/// normal editing.
fn handle_suggestion_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Tab | KeyCode::Down => app.suggestion_next(),
        KeyCode::BackTab | KeyCode::Up => app.suggestion_previous(),
        KeyCode::Enter if key.modifiers.is_empty() => {
            app.accept_suggestion();
        }
        KeyCode::Esc => app.close_suggestions(),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use futures_util::future::BoxFuture;
    use futures_util::{FutureExt, StreamExt, stream};

    use termai_engine::termai_providers::ChunkStream;
    use termai_engine::{
        App, CompletionGateway, CompletionRequest, GatewayError, Phase, Profile, SessionSettings,
    };
    use termai_types::{ApiKey, SamplingParams};

    use super::*;

    struct Silent;

    impl CompletionGateway for Silent {
        fn open(
            &self,
            _request: CompletionRequest,
        ) -> BoxFuture<'static, Result<ChunkStream, GatewayError>> {
            async { Ok(stream::pending().boxed()) }.boxed()
        }
    }

    fn app(dir: &Path) -> App {
        let profile = Profile {
            name: "test".to_string(),
            provider: "openai".to_string(),
            endpoint: "http://localhost:9/v1".to_string(),
            model: "m".to_string(),
            api_key: ApiKey::new("k"),
            sampling: SamplingParams::default(),
        };
        let settings = SessionSettings {
            conversations_dir: dir.to_path_buf(),
            ..SessionSettings::default()
        };
        App::new(profile, Arc::new(Silent), settings)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            apply_event(app, key(KeyCode::Char(c)));
        }
    }

    #[tokio::test]
    async fn plain_enter_inserts_newline_in_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        type_str(&mut app, "hi");
        apply_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.draft().text(), "hi\n");
        assert!(app.transcript().is_empty());
    }

    #[tokio::test]
    async fn alt_enter_submits_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        type_str(&mut app, "hi");
        apply_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::ALT));
        assert_eq!(app.phase(), Phase::Streaming);
        assert!(app.draft().is_empty());
    }

    #[tokio::test]
    async fn suggestion_keys_navigate_and_accept() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        type_str(&mut app, "/co");
        apply_event(&mut app, key(KeyCode::Tab));
        apply_event(&mut app, key(KeyCode::Down));
        apply_event(&mut app, key(KeyCode::BackTab));
        apply_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.draft().text(), "/context-add");
        assert!(!app.suggestions().is_open());
    }

    #[tokio::test]
    async fn esc_closes_suggestions_and_enter_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        type_str(&mut app, "/help");
        apply_event(&mut app, key(KeyCode::Esc));
        assert!(!app.suggestions().is_open());
        apply_event(&mut app, key(KeyCode::Enter));
        assert!(app.draft().is_empty());
        assert!(!app.display().is_empty());
    }

    #[tokio::test]
    async fn ctrl_bindings_edit_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        type_str(&mut app, "one two");
        apply_event(&mut app, key_with(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(app.draft().text(), "one ");
        apply_event(&mut app, key_with(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert!(app.draft().is_empty());

        apply_event(&mut app, key_with(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
    }

    #[tokio::test]
    async fn paste_normalizes_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        apply_event(&mut app, Event::Paste("a\r\nb\rc".to_string()));
        assert_eq!(app.draft().text(), "a\nb\nc");
    }
}
