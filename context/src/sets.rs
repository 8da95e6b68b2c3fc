use std::path::{Path, PathBuf};

use termai_types::Attachment;

/// Insertion-ordered attachments keyed by source path.
#[derive(Debug, Clone, Default)]
pub struct AttachmentSet {
    entries: Vec<Attachment>,
}

impl AttachmentSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attachment> {
        self.entries.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Attachment] {
        &self.entries
    }

    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.iter().any(|a| a.source_path == path)
    }

    /// Insert, replacing an entry with the same source path in place.
    pub fn insert(&mut self, attachment: Attachment) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.source_path == attachment.source_path)
        {
            Some(slot) => *slot = attachment,
            None => self.entries.push(attachment),
        }
    }

    pub fn remove_path(&mut self, path: &Path) -> Option<Attachment> {
        let index = self.entries.iter().position(|a| a.source_path == path)?;
        Some(self.entries.remove(index))
    }

    /// Remove the first entry whose name or source path equals `needle`.
    pub fn remove_matching(&mut self, needle: &str) -> Option<Attachment> {
        let index = self.entries.iter().position(|a| a.matches(needle))?;
        Some(self.entries.remove(index))
    }

    /// Empties the set, returning how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.name.as_str())
    }
}

impl<'a> IntoIterator for &'a AttachmentSet {
    type Item = &'a Attachment;
    type IntoIter = std::slice::Iter<'a, Attachment>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The two attachment sets of a session.
///
/// A source path lives in at most one of the two sets. Adding to one set
/// evicts the same path from the other.
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    ephemeral: AttachmentSet,
    context: AttachmentSet,
    context_dir: Option<PathBuf>,
}

impl Attachments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ephemeral(&self) -> &AttachmentSet {
        &self.ephemeral
    }

    #[must_use]
    pub fn context(&self) -> &AttachmentSet {
        &self.context
    }

    #[must_use]
    pub fn context_dir(&self) -> Option<&Path> {
        self.context_dir.as_deref()
    }

    pub fn set_context_dir(&mut self, dir: PathBuf) {
        self.context_dir = Some(dir);
    }

    /// Adds to the ephemeral set, moving any context entry with the same path.
    pub fn attach(&mut self, attachments: impl IntoIterator<Item = Attachment>) -> usize {
        let mut added = 0;
        for attachment in attachments {
            if self.context.remove_path(&attachment.source_path).is_some() {
                tracing::debug!(name = %attachment.name, "Moving context file to attachments");
            }
            self.ephemeral.insert(attachment);
            added += 1;
        }
        added
    }

    /// Adds to the context set, moving any ephemeral entry with the same path.
    pub fn add_context(&mut self, attachments: impl IntoIterator<Item = Attachment>) -> usize {
        let mut added = 0;
        for attachment in attachments {
            self.ephemeral.remove_path(&attachment.source_path);
            self.context.insert(attachment);
            added += 1;
        }
        added
    }

    pub fn remove_context(&mut self, needle: &str) -> Option<Attachment> {
        self.context.remove_matching(needle)
    }

    pub fn clear_ephemeral(&mut self) -> usize {
        self.ephemeral.clear()
    }

    /// Ephemeral entries first, then context entries.
    pub fn all(&self) -> impl Iterator<Item = &Attachment> {
        self.ephemeral.iter().chain(self.context.iter())
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.ephemeral.len() + self.context.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termai_types::AttachmentKind;

    fn file(name: &str, payload: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            kind: AttachmentKind::Text,
            payload: payload.to_string(),
            source_path: PathBuf::from("/work").join(name),
        }
    }

    #[test]
    fn insert_replaces_same_path_in_place() {
        let mut set = AttachmentSet::new();
        set.insert(file("a.md", "v1"));
        set.insert(file("b.md", "b"));
        set.insert(file("a.md", "v2"));

        let payloads: Vec<_> = set.iter().map(|a| a.payload.as_str()).collect();
        assert_eq!(payloads, vec!["v2", "b"]);
    }

    #[test]
    fn remove_matching_accepts_name_or_path() {
        let mut set = AttachmentSet::new();
        set.insert(file("a.md", "a"));
        set.insert(file("b.md", "b"));

        assert_eq!(set.remove_matching("/work/b.md").unwrap().name, "b.md");
        assert_eq!(set.remove_matching("a.md").unwrap().name, "a.md");
        assert!(set.remove_matching("a.md").is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn context_add_moves_entry_out_of_ephemeral() {
        let mut attachments = Attachments::new();
        attachments.attach([file("a.md", "a"), file("b.md", "b")]);

        attachments.add_context([file("a.md", "a")]);

        assert_eq!(attachments.ephemeral().names().collect::<Vec<_>>(), vec!["b.md"]);
        assert_eq!(attachments.context().names().collect::<Vec<_>>(), vec!["a.md"]);
    }

    #[test]
    fn attach_moves_entry_out_of_context() {
        let mut attachments = Attachments::new();
        attachments.add_context([file("a.md", "a"), file("b.md", "b")]);

        let added = attachments.attach([file("a.md", "a"), file("c.md", "c")]);

        assert_eq!(added, 2);
        assert_eq!(attachments.context().names().collect::<Vec<_>>(), vec!["b.md"]);
        assert_eq!(
            attachments.ephemeral().names().collect::<Vec<_>>(),
            vec!["a.md", "c.md"]
        );
    }

    #[test]
    fn all_lists_ephemeral_before_context() {
        let mut attachments = Attachments::new();
        attachments.add_context([file("ctx.md", "c")]);
        attachments.attach([file("eph.md", "e")]);

        let names: Vec<_> = attachments.all().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["eph.md", "ctx.md"]);
    }

    #[test]
    fn clear_ephemeral_reports_count_and_keeps_context() {
        let mut attachments = Attachments::new();
        attachments.attach([file("a.md", "a"), file("b.md", "b")]);
        attachments.add_context([file("c.md", "c")]);

        assert_eq!(attachments.clear_ephemeral(), 2);
        assert_eq!(attachments.context().len(), 1);
    }
}
