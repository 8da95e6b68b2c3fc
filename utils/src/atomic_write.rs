//! Atomic file write helpers.
//!
//! The payload goes to a temp file in the destination directory and is then
//! renamed over the target, so a reader never observes a half-written file.
//! Where rename-over-existing fails (Windows), the old file is parked as
//! `.bak` and restored if the second rename also fails.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityPolicy {
    /// `sync_all` the temp file before it replaces the target.
    #[default]
    Sync,
    /// Leave flushing to the OS. Used by tests.
    Relaxed,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Create missing parent directories before writing.
    pub create_parents: bool,
    pub durability: DurabilityPolicy,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create_parents: true,
            durability: DurabilityPolicy::Sync,
        }
    }
}

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with_options(path, bytes, WriteOptions::default())
}

pub fn atomic_write_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: WriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if options.create_parents {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if options.durability == DurabilityPolicy::Sync {
        tmp.as_file().sync_all()?;
    }

    let Err(err) = tmp.persist(path) else {
        debug!(path = %path.display(), bytes = bytes.len(), "Atomic write persisted");
        return Ok(());
    };

    if !path.exists() {
        return Err(err.error);
    }

    let backup = path.with_extension("bak");
    let _ = fs::remove_file(&backup);
    fs::rename(path, &backup)?;
    if let Err(retry) = err.file.persist(path) {
        let _ = fs::rename(&backup, path);
        return Err(retry.error);
    }
    if let Err(e) = fs::remove_file(&backup) {
        tracing::warn!(path = %backup.display(), "Failed to remove .bak after atomic write: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{DurabilityPolicy, WriteOptions, atomic_write_with_options};

    const RELAXED: WriteOptions = WriteOptions {
        create_parents: true,
        durability: DurabilityPolicy::Relaxed,
    };

    #[test]
    fn overwrites_existing_file_without_leaving_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.txt");

        atomic_write_with_options(&path, b"one", RELAXED).expect("write one");
        atomic_write_with_options(&path, b"two", RELAXED).expect("write two");

        assert_eq!(fs::read_to_string(&path).expect("read"), "two");
        assert!(!path.with_extension("bak").exists());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a").join("b").join("chat.txt");

        atomic_write_with_options(&path, b"hello", RELAXED).expect("write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "hello");
    }

    #[test]
    fn missing_parent_is_an_error_when_creation_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("chat.txt");
        let options = WriteOptions {
            create_parents: false,
            ..RELAXED
        };

        assert!(atomic_write_with_options(&path, b"x", options).is_err());
    }
}
