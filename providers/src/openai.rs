//! OpenAI-compatible `/chat/completions` client.
//!
//! Works against any server that speaks the chat-completions dialect with
//! `stream: true`. Messages carrying images switch to the content-part array
//! form; plain messages stay as a string.

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use serde::Serialize;
use serde_json::Value;

use termai_types::{Chunk, Message, Profile, Role};

use crate::sse_types::chat_completions as typed;
use crate::{
    ChunkStream, CompletionGateway, CompletionRequest, GatewayError, SseParseAction, SseParser,
    base_client_builder, decode_sse_stream, parse_sse_payload, read_capped_error_body,
};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: WireContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

impl<'a> WireMessage<'a> {
    fn from_message(message: &'a Message) -> Self {
        let content = if message.images.is_empty() {
            WireContent::Text(&message.text)
        } else {
            let mut parts = Vec::with_capacity(message.images.len() + 1);
            parts.push(ContentPart::Text {
                text: &message.text,
            });
            parts.extend(message.images.iter().map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            }));
            WireContent::Parts(parts)
        };
        Self {
            role: message.role,
            content,
        }
    }
}

pub(crate) fn build_request_body(model: &str, request: &CompletionRequest) -> Value {
    let sampling = request.sampling;
    let body = ChatRequest {
        model,
        messages: request
            .messages
            .iter()
            .map(WireMessage::from_message)
            .collect(),
        temperature: sampling.temperature,
        max_tokens: (sampling.max_tokens > 0).then_some(sampling.max_tokens),
        top_p: sampling.top_p.filter(|p| *p > 0.0),
        stream: request.stream,
    };
    serde_json::to_value(&body).unwrap_or(Value::Null)
}

#[must_use]
pub fn completions_url(endpoint: &str) -> String {
    format!("{}/chat/completions", endpoint.trim_end_matches('/'))
}

/// Parser for streamed chat-completions deltas.
#[derive(Debug, Default)]
struct ChatCompletionsParser;

impl SseParser for ChatCompletionsParser {
    fn parse(&mut self, json: &Value) -> SseParseAction {
        let Some(event) = parse_sse_payload::<typed::StreamResponse>(json, self.provider_name())
        else {
            return SseParseAction::Continue;
        };

        if let Some(error) = event.error {
            return SseParseAction::Error(format!("API stream error: {}", error.message));
        }

        // Only the first choice is rendered; `n > 1` is never requested.
        let Some(choice) = event.choices.into_iter().next() else {
            return SseParseAction::Continue;
        };

        let mut chunks = Vec::new();
        let text = choice.delta.content.unwrap_or_default();
        let thinking = choice.delta.thinking.unwrap_or_default();
        if !text.is_empty() || !thinking.is_empty() {
            chunks.push(Chunk {
                text,
                thinking,
                ..Chunk::default()
            });
        }

        match (chunks.is_empty(), choice.finish_reason.is_some()) {
            (true, false) => SseParseAction::Continue,
            (true, true) => SseParseAction::Done,
            (false, finished) => {
                if finished {
                    chunks.push(Chunk::end());
                }
                SseParseAction::Emit(chunks)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Gateway for one resolved profile.
#[derive(Debug, Clone)]
pub struct OpenAICompatible {
    client: reqwest::Client,
    profile: Profile,
}

impl OpenAICompatible {
    pub fn new(profile: Profile) -> Result<Self, GatewayError> {
        let client = base_client_builder()
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, profile })
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }
}

impl CompletionGateway for OpenAICompatible {
    fn open(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'static, Result<ChunkStream, GatewayError>> {
        let client = self.client.clone();
        let url = completions_url(&self.profile.endpoint);
        let api_key = self.profile.api_key.clone();
        let body = build_request_body(&self.profile.model, &request);

        async move {
            tracing::debug!(%url, messages = request.messages.len(), "Opening completion stream");
            let response = client
                .post(&url)
                .bearer_auth(api_key.expose_secret())
                .json(&body)
                .send()
                .await
                .map_err(GatewayError::Connect)?;

            let status = response.status();
            if !status.is_success() {
                let body = read_capped_error_body(response).await;
                return Err(GatewayError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(decode_sse_stream(
                response.bytes_stream().boxed(),
                ChatCompletionsParser,
            ))
        }
        .boxed()
    }
}
