//! Non-interactive entry points: one-shot prompts and the `conv`/`config`
//! subcommands.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;

use termai_engine::termai_providers::CompletionRequest;
use termai_engine::{
    AttachmentLoader, Message, OpenAICompatible, Profile, StreamSequencer, TRANSCRIPT_EXTENSION,
    TermaiConfig, merge_attachments,
};

pub fn config_path() -> Result<()> {
    let path = TermaiConfig::path().context("could not determine the home directory")?;
    println!("{}", path.display());
    Ok(())
}

/// Transcript files directly inside `dir`, sorted by file name.
pub fn saved_conversations(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == TRANSCRIPT_EXTENSION)
        {
            found.push(path);
        }
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

pub fn list_conversations(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        println!("No saved conversations in {}", dir.display());
        return Ok(());
    }
    let found = saved_conversations(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?;
    if found.is_empty() {
        println!("No saved conversations in {}", dir.display());
        return Ok(());
    }
    for path in found {
        if let Some(name) = path.file_name() {
            println!("{}", name.to_string_lossy());
        }
    }
    Ok(())
}

/// Messages for a single prompt: optional system context, then the prompt with
/// attachments folded in.
pub fn one_shot_messages(
    system_context: Option<&str>,
    prompt: &str,
    loader: &AttachmentLoader,
    files: &[PathBuf],
) -> Result<Vec<Message>> {
    let report = loader.load_all(files);
    if let Some(error) = report.failed.first() {
        bail!("{error}");
    }

    let mut messages = Vec::new();
    if let Some(context) = system_context.filter(|c| !c.trim().is_empty()) {
        messages.push(Message::system(context));
    }
    messages.push(Message::user(prompt));
    Ok(merge_attachments(&messages, &report.loaded))
}

pub async fn one_shot(
    config: &TermaiConfig,
    profile: Profile,
    prompt: &str,
    files: &[PathBuf],
) -> Result<()> {
    let loader = AttachmentLoader::new(config.files.max_file_size);
    let messages = one_shot_messages(config.system_context.as_deref(), prompt, &loader, files)?;

    let sampling = profile.sampling;
    let gateway = OpenAICompatible::new(profile)?;
    let sequencer = StreamSequencer::new(Arc::new(gateway));
    let mut handle = sequencer.start(CompletionRequest::streaming(messages, sampling));

    let show_thinking = config.ui.show_thinking;
    let mut stdout = io::stdout().lock();
    loop {
        let chunk = handle.next().await;
        if show_thinking && !chunk.thinking.is_empty() {
            eprint!("{}", chunk.thinking.as_str().dim());
        }
        if !chunk.text.is_empty() {
            stdout.write_all(chunk.text.as_bytes())?;
            stdout.flush()?;
        }
        if let Some(error) = chunk.error {
            writeln!(stdout)?;
            bail!("{error}");
        }
        if chunk.is_final {
            break;
        }
    }
    writeln!(stdout)?;
    Ok(())
}
