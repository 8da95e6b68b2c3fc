use termai_engine::Clipboard;

/// System clipboard via `arboard`.
///
/// The handle is opened lazily and reused. Some platforms (X11) drop the
/// clipboard contents when the owning handle goes away, so it is kept for the
/// life of the session.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
            self.inner = Some(clipboard);
        }
        let Some(clipboard) = self.inner.as_mut() else {
            return Err("clipboard unavailable".to_string());
        };
        clipboard.set_text(text).map_err(|e| {
            tracing::warn!("Clipboard write failed: {e}");
            e.to_string()
        })
    }
}
