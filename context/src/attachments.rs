//! File attachment loading.
//!
//! The kind is decided by extension alone. Images become `data:` URLs, PDFs are
//! reduced to their text, and text/code files are read as UTF-8.

use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use termai_types::{Attachment, AttachmentKind};

/// 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

const CODE_EXTENSIONS: &[&str] = &[
    "go", "py", "js", "ts", "tsx", "jsx", "java", "c", "cpp", "cc", "h", "hpp", "rs", "rb", "php",
    "sh", "bash", "yaml", "yml", "json", "xml", "html", "css", "sql",
];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("file does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{} is a directory, not a file", .0.display())]
    IsDirectory(PathBuf),
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("{} is too large ({size} bytes, limit {limit})", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to extract text from PDF {}: {reason}", path.display())]
    Pdf { path: PathBuf, reason: String },
    #[error("no supported files found in directory")]
    EmptyDirectory(PathBuf),
}

/// Result of loading several files: successes and per-file failures.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<Attachment>,
    pub failed: Vec<AttachmentError>,
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Attachment kind for a path, by extension.
#[must_use]
pub fn classify(path: &Path) -> Option<AttachmentKind> {
    let ext = lowercase_extension(path)?;
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.iter().any(|(e, _)| *e == ext) {
        Some(AttachmentKind::Image)
    } else if ext == "pdf" {
        Some(AttachmentKind::Pdf)
    } else if TEXT_EXTENSIONS.contains(&ext) {
        Some(AttachmentKind::Text)
    } else if CODE_EXTENSIONS.contains(&ext) {
        Some(AttachmentKind::Code)
    } else {
        None
    }
}

fn image_mime(path: &Path) -> &'static str {
    let ext = lowercase_extension(path).unwrap_or_default();
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map_or("application/octet-stream", |(_, mime)| *mime)
}

/// Loads files into attachments under a size limit.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentLoader {
    max_file_size: u64,
}

impl Default for AttachmentLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl AttachmentLoader {
    #[must_use]
    pub const fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    #[must_use]
    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn load(&self, path: &Path) -> Result<Attachment, AttachmentError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AttachmentError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(AttachmentError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if metadata.is_dir() {
            return Err(AttachmentError::IsDirectory(path.to_path_buf()));
        }

        let Some(kind) = classify(path) else {
            let ext = path
                .extension()
                .map_or_else(|| "(none)".to_string(), |e| format!(".{}", e.to_string_lossy()));
            return Err(AttachmentError::Unsupported(ext));
        };

        if metadata.len() > self.max_file_size {
            return Err(AttachmentError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        let read_err = |source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        };
        let payload = match kind {
            AttachmentKind::Image => {
                let bytes = fs::read(path).map_err(read_err)?;
                format!("data:{};base64,{}", image_mime(path), STANDARD.encode(bytes))
            }
            AttachmentKind::Pdf => extract_pdf_text(path)?,
            AttachmentKind::Text | AttachmentKind::Code => {
                fs::read_to_string(path).map_err(read_err)?
            }
        };

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let source_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        tracing::debug!(path = %source_path.display(), %kind, "Loaded attachment");
        Ok(Attachment {
            name,
            kind,
            payload,
            source_path,
        })
    }

    /// Load every path, keeping successes even when some fail.
    pub fn load_all<P: AsRef<Path>>(&self, paths: &[P]) -> LoadReport {
        let mut report = LoadReport::default();
        for path in paths {
            match self.load(path.as_ref()) {
                Ok(attachment) => report.loaded.push(attachment),
                Err(e) => {
                    tracing::warn!("Attachment failed: {e}");
                    report.failed.push(e);
                }
            }
        }
        report
    }

    /// Load supported files at the top level of `dir`, in file-name order.
    pub fn scan_directory(&self, dir: &Path) -> Result<Vec<Attachment>, AttachmentError> {
        let entries = fs::read_dir(dir).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AttachmentError::NotFound(dir.to_path_buf())
            } else {
                AttachmentError::Read {
                    path: dir.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && classify(path).is_some())
            .collect();
        paths.sort();

        let report = self.load_all(&paths);
        if report.loaded.is_empty() {
            return Err(AttachmentError::EmptyDirectory(dir.to_path_buf()));
        }
        Ok(report.loaded)
    }
}

fn extract_pdf_text(path: &Path) -> Result<String, AttachmentError> {
    // pdf-extract panics on some malformed documents.
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path)));
    let text = match extracted {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(AttachmentError::Pdf {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            return Err(AttachmentError::Pdf {
                path: path.to_path_buf(),
                reason: "parser panicked".to_string(),
            });
        }
    };

    if text.trim().is_empty() {
        return Err(AttachmentError::Pdf {
            path: path.to_path_buf(),
            reason: "no text content could be extracted from PDF".to_string(),
        });
    }
    Ok(text)
}
