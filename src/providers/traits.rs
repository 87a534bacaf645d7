use super::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Generation options supplied by the caller. Named fields are normalized
/// per protocol family; anything else in `extra` is passed through verbatim
/// to OpenAI-compatible backends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationOptions {
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 4000;
    pub const DEFAULT_TOP_P: f64 = 1.0;

    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS)
    }

    pub fn top_p_or_default(&self) -> f64 {
        self.top_p.unwrap_or(Self::DEFAULT_TOP_P)
    }
}

/// Token accounting reported by a backend. Fields a backend omits stay
/// `None` and serialize as explicit nulls so the response shape never
/// varies by backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Normalized completion result. Identical shape regardless of which
/// backend served the request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub content: String,
    /// Model the backend reports having used (may differ from the request).
    pub model: String,
    /// Backend that served the request.
    pub backend: String,
    pub usage: TokenUsage,
}

/// One backend's wire protocol: exactly one network call per invocation,
/// returning the normalized result or a structured provider error.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, ProviderError>;
}
