//! Profile descriptor handed to the gateway. Opaque to the session engine
//! beyond display.

/// Bearer credential for a completion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Sampling parameters forwarded verbatim in each request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: Option<f64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            top_p: None,
        }
    }
}

/// Resolved connection profile.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    /// Free-form provider label (e.g. "openai", "ollama"); all profiles speak
    /// the OpenAI-compatible chat-completions protocol.
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: ApiKey,
    pub sampling: SamplingParams,
}
