//! Folding attachments into an outgoing request.

use termai_types::{Attachment, AttachmentKind, Message, Role};

/// Delimited block appended to the message body for one textual attachment.
#[must_use]
pub fn render_attachment_block(attachment: &Attachment) -> String {
    format!(
        "\n\n--- Content from {name} ---\n{content}\n--- End of {name} ---",
        name = attachment.name,
        content = attachment.payload,
    )
}

/// Returns a copy of `messages` with `attachments` merged into the final
/// user message.
///
/// Textual attachments are appended to the body in order; images replace the
/// message's image list when there is at least one. The inputs are not
/// modified, so the merge can be repeated with the same result. If the last
/// message is not a user message the copy is returned unchanged.
pub fn merge_attachments<'a>(
    messages: &[Message],
    attachments: impl IntoIterator<Item = &'a Attachment>,
) -> Vec<Message> {
    let mut merged = messages.to_vec();
    let Some(last) = merged.last_mut().filter(|m| m.role == Role::User) else {
        return merged;
    };

    let mut images = Vec::new();
    for attachment in attachments {
        match attachment.kind {
            AttachmentKind::Image => images.push(attachment.payload.clone()),
            AttachmentKind::Pdf | AttachmentKind::Text | AttachmentKind::Code => {
                last.text.push_str(&render_attachment_block(attachment));
            }
        }
    }
    if !images.is_empty() {
        last.images = images;
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn attachment(name: &str, kind: AttachmentKind, payload: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            kind,
            payload: payload.to_string(),
            source_path: PathBuf::from("/w").join(name),
        }
    }

    #[test]
    fn text_blocks_and_images_keep_attachment_order() {
        let messages = vec![Message::system("sys"), Message::user("look")];
        let files = vec![
            attachment("b.png", AttachmentKind::Image, "data:image/png;base64,B"),
            attachment("notes.md", AttachmentKind::Text, "n"),
            attachment("a.png", AttachmentKind::Image, "data:image/png;base64,A"),
            attachment("doc.pdf", AttachmentKind::Pdf, "p"),
        ];

        let merged = merge_attachments(&messages, &files);

        assert_eq!(merged[0], messages[0]);
        assert_eq!(
            merged[1].text,
            "look\n\n--- Content from notes.md ---\nn\n--- End of notes.md ---\
             \n\n--- Content from doc.pdf ---\np\n--- End of doc.pdf ---"
        );
        assert_eq!(
            merged[1].images,
            vec!["data:image/png;base64,B", "data:image/png;base64,A"]
        );
    }

    #[test]
    fn merge_is_repeatable_and_leaves_inputs_alone() {
        let messages = vec![Message::user("q")];
        let files = vec![attachment("main.rs", AttachmentKind::Code, "fn main() {}")];

        let first = merge_attachments(&messages, &files);
        let second = merge_attachments(&messages, &files);

        assert_eq!(first, second);
        assert_eq!(messages[0].text, "q");
        assert_eq!(files[0].payload, "fn main() {}");
    }

    #[test]
    fn existing_images_kept_without_image_attachments() {
        let messages = vec![Message::user("q").with_images(vec!["data:x".to_string()])];
        let files = vec![attachment("a.txt", AttachmentKind::Text, "t")];

        let merged = merge_attachments(&messages, &files);

        assert_eq!(merged[0].images, vec!["data:x"]);
    }

    #[test]
    fn non_user_tail_is_untouched() {
        let messages = vec![Message::user("q"), Message::assistant("a")];
        let files = vec![attachment("a.txt", AttachmentKind::Text, "t")];

        assert_eq!(merge_attachments(&messages, &files), messages);
    }
}
