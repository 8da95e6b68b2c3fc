/// System clipboard seam. The TUI provides the real implementation.
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String>;
}

/// Clipboard that refuses every write; used when none is available.
#[derive(Debug, Default)]
pub struct NoClipboard;

impl Clipboard for NoClipboard {
    fn set_text(&mut self, _text: &str) -> Result<(), String> {
        Err("clipboard unavailable".to_string())
    }
}
