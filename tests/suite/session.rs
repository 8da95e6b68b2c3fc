//! End-to-end session behaviour: App + real gateway + transcript files.

use std::fs;

use wiremock::MockServer;

use termai_context::{RECORD_SEPARATOR, TranscriptStore};
use termai_engine::{DisplayItem, Message, NoticeLevel, Phase, Role};

use crate::common::{app_for, mount_error, mount_streaming_response, request_bodies};

#[test]
fn transcript_file_round_trip_preserves_multiline_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.txt");
    let dashes = "-".repeat(RECORD_SEPARATOR.len());

    let mut store = TranscriptStore::new();
    store.append(Role::System, "rules", Vec::new());
    store.append(Role::User, "line one\n\nline three", Vec::new());
    store.append(Role::Assistant, format!("before\n{dashes}\nafter"), Vec::new());
    store.save(&path).unwrap();

    let mut loaded = TranscriptStore::new();
    assert_eq!(loaded.load(&path).unwrap(), 3);
    assert_eq!(loaded.messages(), store.messages());
}

#[test]
fn unterminated_final_record_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tail.txt");
    fs::write(&path, "user: hello\n").unwrap();

    let mut store = TranscriptStore::new();
    assert_eq!(store.load(&path).unwrap(), 1);
    assert_eq!(store.messages(), &[Message::user("hello")]);
}

#[tokio::test]
async fn streamed_reply_is_committed_and_saved() {
    let server = MockServer::start().await;
    mount_streaming_response(&server, &["Hel", "lo"]).await;
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_for(&server, dir.path());

    assert!(app.submit_message("hi"));
    while app.pump_stream().await {}

    assert_eq!(app.phase(), Phase::Composing);
    assert_eq!(
        app.transcript().messages(),
        &[Message::user("hi"), Message::assistant("Hello")]
    );

    app.process_command("/save first");
    let saved = fs::read_to_string(dir.path().join("first.txt")).unwrap();
    assert_eq!(
        saved,
        format!("user: hi\n{RECORD_SEPARATOR}\nassistant: Hello\n{RECORD_SEPARATOR}\n")
    );
}

#[tokio::test]
async fn gateway_failure_is_rendered_and_session_recovers() {
    let server = MockServer::start().await;
    mount_error(&server, 500, "boom").await;
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_for(&server, dir.path());

    app.submit_message("hi");
    while app.pump_stream().await {}

    assert_eq!(app.phase(), Phase::Error);
    let errors: Vec<_> = app
        .display()
        .iter()
        .filter_map(|item| match item {
            DisplayItem::Notice(n) if n.level == NoticeLevel::Error => Some(n.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["Error: API error (status 500): boom"]);
    // The empty assistant placeholder stays closed; a new message can be sent.
    assert!(!app.transcript().has_open_message());
    assert!(app.submit_message("again"));
}

#[tokio::test]
async fn attachments_reach_the_wire_and_ephemeral_clears() {
    let server = MockServer::start().await;
    mount_streaming_response(&server, &["done"]).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("main.rs");
    fs::write(&file, "fn main() {}").unwrap();
    let image = dir.path().join("pic.gif");
    fs::write(&image, b"GIF89a").unwrap();
    let mut app = app_for(&server, dir.path());

    app.process_command(&format!("/attach {} {}", file.display(), image.display()));
    app.submit_message("review");
    while app.pump_stream().await {}

    let bodies = request_bodies(&server).await;
    let content = &bodies[0]["messages"][0]["content"];
    assert_eq!(
        content[0]["text"],
        "review\n\n--- Content from main.rs ---\nfn main() {}\n--- End of main.rs ---"
    );
    assert_eq!(content[1]["image_url"]["url"], "data:image/gif;base64,R0lGODlh");
    assert!(app.attachments().ephemeral().is_empty());
}
