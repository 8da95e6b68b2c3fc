//! Shared test utilities and fixtures
//!
//! Mock chat-completions servers and session builders for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use termai_engine::{App, OpenAICompatible, Profile, SessionSettings};
use termai_types::{ApiKey, SamplingParams};

pub const API_KEY: &str = "sk-integration";

/// Profile pointing at a mock server's `/v1` base.
pub fn profile_for(server: &MockServer) -> Profile {
    Profile {
        name: "mock".to_string(),
        provider: "openai".to_string(),
        endpoint: format!("{}/v1", server.uri()),
        model: "gpt-test".to_string(),
        api_key: ApiKey::new(API_KEY),
        sampling: SamplingParams::default(),
    }
}

pub fn app_for(server: &MockServer, conversations: &Path) -> App {
    let gateway = OpenAICompatible::new(profile_for(server)).expect("client builds");
    let settings = SessionSettings {
        conversations_dir: conversations.to_path_buf(),
        ..SessionSettings::default()
    };
    App::new(profile_for(server), Arc::new(gateway), settings)
}

/// SSE body carrying one content delta per chunk, a finish marker and `[DONE]`.
pub fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let data = serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": chunk}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {data}\n\n"));
    }
    let finish = serde_json::json!({
        "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]
    });
    body.push_str(&format!("data: {finish}\n\n"));
    body.push_str("data: [DONE]\n\n");
    body
}

pub async fn mount_raw_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(server)
        .await;
}

pub async fn mount_streaming_response(server: &MockServer, chunks: &[&str]) {
    mount_raw_stream(server, sse_body(chunks)).await;
}

pub async fn mount_error(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// JSON bodies of every request the server received.
pub async fn request_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|req| serde_json::from_slice(&req.body).expect("request body is json"))
        .collect()
}
