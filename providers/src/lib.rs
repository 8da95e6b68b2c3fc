//! Completion gateway contract and the OpenAI-compatible streaming client.
//!
//! # Architecture
//!
//! - [`CompletionGateway`] - The contract the session engine consumes: given an
//!   ordered message list, open an asynchronous, finite sequence of [`Chunk`]s.
//! - [`openai`] - Client for any OpenAI-compatible `/chat/completions`
//!   endpoint (OpenAI, Ollama, Abacus, vLLM, ...).
//!
//! # Streaming
//!
//! Responses are server-sent-event lines. Each line is either blank (ignored)
//! or `data: ` followed by the `[DONE]` sentinel or a JSON object. Lines are
//! framed by the decoder in this module and interpreted by a provider-specific
//! [`SseParser`], producing a pull-based [`ChunkStream`]:
//!
//! | Outcome | Chunk |
//! |---------|-------|
//! | content / thinking delta | `Chunk { text, thinking, .. }` |
//! | `[DONE]`, finish marker, EOF | `Chunk { is_final: true, .. }` |
//! | transport error, oversized buffer, invalid UTF-8 | `Chunk { error: Some(..), .. }` |
//!
//! # Error Handling
//!
//! Failures before the first byte (connect, non-2xx status) are returned as
//! [`GatewayError`] from [`CompletionGateway::open`]. Failures after that point
//! are delivered in-band as an error chunk so partial output is preserved.

pub mod openai;
pub mod sse_types;

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, Stream};
use futures_util::StreamExt;
use thiserror::Error;

pub use openai::OpenAICompatible;
pub use termai_types;
use termai_types::{Chunk, Message, SamplingParams};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Lazy, finite, non-restartable sequence of chunks.
pub type ChunkStream = BoxStream<'static, Chunk>;

/// What the engine hands to a gateway for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub sampling: SamplingParams,
    pub stream: bool,
}

impl CompletionRequest {
    #[must_use]
    pub fn streaming(messages: Vec<Message>, sampling: SamplingParams) -> Self {
        Self {
            messages,
            sampling,
            stream: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to send request: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },
    #[error("invalid request: {0}")]
    Request(String),
}

/// Source of streamed completions.
///
/// `open` resolves once the response headers are in: a connection failure or
/// non-2xx status is an `Err`, everything after is in-band.
pub trait CompletionGateway: Send + Sync {
    fn open(&self, request: CompletionRequest)
    -> BoxFuture<'static, Result<ChunkStream, GatewayError>>;
}

pub(crate) fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

fn drain_next_sse_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

fn extract_sse_data(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[derive(Debug)]
pub(crate) enum SseParseAction {
    /// Continue processing, no chunk to emit
    Continue,
    /// Emit these chunks and continue (a terminal chunk ends the stream)
    Emit(Vec<Chunk>),
    /// Stream is done (finish marker)
    Done,
    Error(String),
}

pub(crate) trait SseParser {
    fn parse(&mut self, json: &serde_json::Value) -> SseParseAction;
    fn provider_name(&self) -> &'static str;
}

pub(crate) fn parse_sse_payload<T>(
    json: &serde_json::Value,
    provider_name: &'static str,
) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    match serde_json::from_value(json.clone()) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(%e, provider = provider_name, "Failed to parse SSE event");
            None
        }
    }
}

struct SseDecoder<S, P> {
    body: S,
    parser: P,
    buffer: Vec<u8>,
    pending: VecDeque<Chunk>,
    finished: bool,
}

impl<S, B, E, P> SseDecoder<S, P>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    P: SseParser,
{
    async fn next_chunk(&mut self) -> Option<Chunk> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                if chunk.is_terminal() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(chunk);
            }
            if self.finished {
                return None;
            }

            if let Some(line) = drain_next_sse_line(&mut self.buffer) {
                self.handle_line(&line);
                continue;
            }

            match self.body.next().await {
                Some(Ok(bytes)) => {
                    self.buffer.extend_from_slice(bytes.as_ref());
                    // Security: prevent unbounded buffer growth
                    if self.buffer.len() > MAX_SSE_BUFFER_BYTES {
                        self.pending.push_back(Chunk::error(
                            "SSE buffer exceeded maximum size (4 MiB)",
                        ));
                    }
                }
                Some(Err(e)) => {
                    self.pending
                        .push_back(Chunk::error(format!("stream read failed: {e}")));
                }
                None => {
                    let rest = std::mem::take(&mut self.buffer);
                    if !rest.is_empty() {
                        self.handle_line(&rest);
                    }
                    // EOF without a sentinel still completes the stream.
                    self.pending.push_back(Chunk::end());
                }
            }
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let Ok(line) = std::str::from_utf8(line) else {
            self.pending
                .push_back(Chunk::error("Received invalid UTF-8 from SSE stream"));
            return;
        };

        let Some(data) = extract_sse_data(line) else {
            return;
        };

        if data == "[DONE]" {
            self.pending.push_back(Chunk::end());
            return;
        }

        match serde_json::from_str::<serde_json::Value>(data) {
            Ok(json) => match self.parser.parse(&json) {
                SseParseAction::Continue => {}
                SseParseAction::Emit(chunks) => self.pending.extend(chunks),
                SseParseAction::Done => self.pending.push_back(Chunk::end()),
                SseParseAction::Error(msg) => self.pending.push_back(Chunk::error(msg)),
            },
            Err(e) => {
                tracing::warn!(
                    %e,
                    payload_bytes = data.len(),
                    provider = self.parser.provider_name(),
                    "Skipping invalid SSE JSON payload"
                );
            }
        }
    }
}

/// Turn a raw response body into ordered chunks using `parser`.
pub(crate) fn decode_sse_stream<S, B, E, P>(body: S, parser: P) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    P: SseParser + Send + 'static,
{
    let decoder = SseDecoder {
        body,
        parser,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures_util::stream::unfold(decoder, |mut decoder| async move {
        let chunk = decoder.next_chunk().await?;
        Some((chunk, decoder))
    })
    .boxed()
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
