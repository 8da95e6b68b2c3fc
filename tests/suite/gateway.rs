//! OpenAI-compatible gateway against a mock chat-completions server.

use futures_util::StreamExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use termai_engine::{Chunk, CompletionGateway, CompletionRequest, GatewayError, OpenAICompatible};
use termai_types::{Message, SamplingParams};

use crate::common::{
    API_KEY, mount_error, mount_raw_stream, mount_streaming_response, profile_for,
    request_bodies, sse_body,
};

fn request(messages: Vec<Message>) -> CompletionRequest {
    CompletionRequest::streaming(messages, SamplingParams::default())
}

async fn collect(gateway: &OpenAICompatible, messages: Vec<Message>) -> Vec<Chunk> {
    let stream = gateway
        .open(request(messages))
        .await
        .expect("stream opens");
    stream.collect().await
}

#[tokio::test]
async fn deltas_arrive_in_order_and_end_once() {
    let server = MockServer::start().await;
    mount_streaming_response(&server, &["Hel", "lo"]).await;
    let gateway = OpenAICompatible::new(profile_for(&server)).unwrap();

    let chunks = collect(&gateway, vec![Message::user("hi")]).await;

    assert_eq!(
        chunks,
        vec![Chunk::delta("Hel"), Chunk::delta("lo"), Chunk::end()]
    );
}

#[tokio::test]
async fn non_success_status_carries_body() {
    let server = MockServer::start().await;
    mount_error(&server, 401, "invalid api key").await;
    let gateway = OpenAICompatible::new(profile_for(&server)).unwrap();

    let Err(err) = gateway.open(request(vec![Message::user("hi")])).await else {
        panic!("expected an error status");
    };

    match &err {
        GatewayError::Status { status, body } => {
            assert_eq!(*status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "API error (status 401): invalid api key");
}

#[tokio::test]
async fn bearer_credential_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(&["ok"]))
                .insert_header("content-type", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let gateway = OpenAICompatible::new(profile_for(&server)).unwrap();

    let chunks = collect(&gateway, vec![Message::user("hi")]).await;

    assert_eq!(chunks.first(), Some(&Chunk::delta("ok")));
}

#[tokio::test]
async fn request_body_carries_sampling_and_image_parts() {
    let server = MockServer::start().await;
    mount_streaming_response(&server, &["seen"]).await;
    let gateway = OpenAICompatible::new(profile_for(&server)).unwrap();

    let message = Message::user("what is this")
        .with_images(vec!["data:image/png;base64,AAAA".to_string()]);
    let _ = collect(&gateway, vec![Message::system("be brief"), message]).await;

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["stream"], true);
    assert_eq!(body["max_tokens"], 4096);
    assert_eq!(body["messages"][0]["content"], "be brief");
    assert_eq!(
        body["messages"][1]["content"],
        serde_json::json!([
            {"type": "text", "text": "what is this"},
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
        ])
    );
}

#[tokio::test]
async fn reasoning_deltas_become_thinking() {
    let server = MockServer::start().await;
    let body = [
        r#"data: {"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#,
        "",
        r#"data: {"choices":[{"delta":{"content":"yes"}}]}"#,
        "",
        "data: [DONE]",
        "",
    ]
    .join("\n");
    mount_raw_stream(&server, body).await;
    let gateway = OpenAICompatible::new(profile_for(&server)).unwrap();

    let chunks = collect(&gateway, vec![Message::user("q")]).await;

    assert_eq!(
        chunks,
        vec![Chunk::thinking("hmm"), Chunk::delta("yes"), Chunk::end()]
    );
}

#[tokio::test]
async fn in_band_error_terminates_stream() {
    let server = MockServer::start().await;
    let body = [
        r#"data: {"choices":[{"delta":{"content":"par"}}]}"#,
        "",
        r#"data: {"error":{"message":"overloaded"}}"#,
        "",
        r#"data: {"choices":[{"delta":{"content":"never"}}]}"#,
        "",
    ]
    .join("\n");
    mount_raw_stream(&server, body).await;
    let gateway = OpenAICompatible::new(profile_for(&server)).unwrap();

    let chunks = collect(&gateway, vec![Message::user("q")]).await;

    assert_eq!(
        chunks,
        vec![Chunk::delta("par"), Chunk::error("API stream error: overloaded")]
    );
}
