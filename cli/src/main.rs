//! termai CLI - Binary entry point and terminal session management.
//!
//! # Architecture
//!
//! The CLI bridges [`termai_engine`] (session state) and [`termai_tui`] (rendering),
//! providing RAII-based terminal management with guaranteed cleanup.
//!
//! ```text
//! main() -> Cli::parse() -> chat:     TerminalSession::new() -> run_app() -> App + TUI
//!                        -> prompt:   commands::one_shot()
//!                        -> conv/config subcommands
//! ```
//!
//! # Event Loop
//!
//! The interactive session uses a fixed 8ms (~120 FPS) render cadence:
//!
//! 1. Wait for frame tick
//! 2. Drain input queue (non-blocking via [`termai_tui::InputPump`])
//! 3. Advance the spinner (`app.tick()`)
//! 4. Apply stream chunks already delivered by the worker
//! 5. Render frame

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::{
    fs::{self, OpenOptions},
    io::{Stdout, stdout},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use termai_engine::{App, OpenAICompatible, SessionSettings, TermaiConfig};
use termai_tui::{InputPump, SystemClipboard, UiOptions, draw, handle_events};

#[derive(Parser)]
#[command(name = "termai")]
#[command(version)]
#[command(about = "Chat with OpenAI-compatible models from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Profile to use (defaults to `default_profile`, then the first profile)
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Attach a file to the first message (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Load every supported file in a directory as persistent context
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    context_dir: Option<PathBuf>,

    /// Resume a saved conversation
    #[arg(long, value_name = "PATH")]
    resume: Option<String>,

    /// Send a single prompt, print the reply and exit
    prompt: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage saved conversations
    Conv {
        #[command(subcommand)]
        command: ConvCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConvCommands {
    /// List saved conversations
    List,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file location
    Path,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: install the filter only so nothing is written over the TUI.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = termai_engine::log_dir() {
        candidates.push(dir.join("termai.log"));
    }
    candidates.push(PathBuf::from(".termai").join("logs").join("termai.log"));
    candidates
}

/// RAII wrapper for terminal state with guaranteed cleanup on drop.
///
/// Raw mode, bracketed paste and the alternate screen are restored when the
/// session drops, including on early returns and panics that unwind.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, EnableBracketedPaste) {
            let _ = disable_raw_mode();
            let _ = execute!(out, LeaveAlternateScreen, DisableBracketedPaste);
            return Err(err.into());
        }

        let terminal = match Terminal::new(CrosstermBackend::new(out)) {
            Ok(t) => t,
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen, DisableBracketedPaste);
                return Err(err.into());
            }
        };

        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableBracketedPaste
        );
        let _ = self.terminal.show_cursor();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Config {
            command: ConfigCommands::Path,
        }) => return commands::config_path(),
        Some(Commands::Conv {
            command: ConvCommands::List,
        }) => {
            let config = load_config()?;
            return commands::list_conversations(&config.conversations_dir());
        }
        None => {}
    }

    let config = load_config()?;
    let profile = config.resolve_profile(cli.profile.as_deref())?;
    tracing::info!(profile = %profile.name, model = %profile.model, "Profile resolved");

    if let Some(prompt) = cli.prompt.as_deref() {
        return commands::one_shot(&config, profile, prompt, &cli.files).await;
    }

    let gateway = OpenAICompatible::new(profile.clone())?;
    let settings = SessionSettings {
        auto_clear_attachments: config.files.auto_clear_after_send,
        show_thinking: config.ui.show_thinking,
        max_file_size: config.files.max_file_size,
        conversations_dir: config.conversations_dir(),
    };
    let mut app = App::new(profile, Arc::new(gateway), settings)
        .with_clipboard(Box::new(SystemClipboard::new()));

    if let Some(context) = config.system_context.as_deref() {
        app.add_system_context(context);
    }
    if let Some(resume) = cli.resume.as_deref() {
        app.resume(resume);
    }
    if let Some(dir) = cli.context_dir.as_deref()
        && let Err(e) = app.load_context_dir(dir)
    {
        anyhow::bail!("failed to load context directory {}: {e}", dir.display());
    }
    app.attach_paths(&cli.files);

    let options = UiOptions::from(&config.ui);
    let result = {
        let mut session = TerminalSession::new()?;
        run_app(&mut session.terminal, &mut app, options).await
    };

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }
    Ok(())
}

fn load_config() -> Result<TermaiConfig> {
    let path = TermaiConfig::path()
        .map_or_else(|| "~/.termai/config.toml".to_string(), |p| p.display().to_string());
    TermaiConfig::load()?.with_context(|| format!("no configuration found; create {path}"))
}

const FRAME_DURATION: Duration = Duration::from_millis(8);

async fn run_app<B>(terminal: &mut Terminal<B>, app: &mut App, options: UiOptions) -> Result<()>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    let mut input = InputPump::new();
    let mut frames = tokio::time::interval(FRAME_DURATION);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result: Result<()> = loop {
        frames.tick().await;

        let quit_now = match handle_events(app, &mut input) {
            Ok(q) => q,
            Err(e) => break Err(e),
        };
        if quit_now {
            break Ok(());
        }

        app.tick();
        app.process_stream_events();

        if let Err(e) = terminal.draw(|frame| draw(frame, app, options)) {
            break Err(e.into());
        }
    };

    app.force_quit();
    input.shutdown().await;
    result
}
