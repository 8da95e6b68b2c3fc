//! Typed SSE event structures for provider responses.
//!
//! Parse errors happen at the serde boundary, not scattered through parsing
//! logic. Every field is `#[serde(default)]` so vendors that omit keys (or send
//! `null`) still deserialize.

pub mod chat_completions {
    use serde::Deserialize;

    /// One `data:` payload of a streamed `/chat/completions` response.
    #[derive(Debug, Default, Deserialize)]
    pub struct StreamResponse {
        #[serde(default)]
        pub choices: Vec<Choice>,
        /// Some OpenAI-compatible servers report failures in-band.
        #[serde(default)]
        pub error: Option<ErrorInfo>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Choice {
        #[serde(default)]
        pub delta: Delta,
        #[serde(default)]
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Delta {
        #[serde(default)]
        pub content: Option<String>,
        /// Reasoning text. Vendors disagree on the key.
        #[serde(default, alias = "reasoning_content", alias = "reasoning")]
        pub thinking: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct ErrorInfo {
        #[serde(default)]
        pub message: String,
    }
}
