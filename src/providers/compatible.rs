//! Generic OpenAI-compatible chat-completions client.
//!
//! Four of the six backends (and OpenAI itself) speak the same
//! `/chat/completions` wire format, so a single implementation covers all
//! of them; only the base URL, credential, and attribution headers differ.

use crate::providers::error::ProviderError;
use crate::providers::traits::{
    ChatMessage, CompletionClient, CompletionResult, GenerationOptions, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Which request field carries the output-token limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenLimitField {
    /// Legacy `max_tokens`, accepted by most chat-completions backends.
    MaxTokens,
    /// `max_completion_tokens`, required by newer OpenAI model families.
    MaxCompletionTokens,
}

impl TokenLimitField {
    fn wire_name(self) -> &'static str {
        match self {
            Self::MaxTokens => "max_tokens",
            Self::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

/// Request-parameter dialect for a model family.
#[derive(Debug, Clone, Copy)]
struct ModelDialect {
    /// Whether the model accepts a custom `temperature` at all. Families
    /// that don't will reject the request outright if the field is sent.
    supports_temperature: bool,
    token_limit_field: TokenLimitField,
}

const DEFAULT_DIALECT: ModelDialect = ModelDialect {
    supports_temperature: true,
    token_limit_field: TokenLimitField::MaxTokens,
};

/// Model-family prefixes whose parameter set changed: fixed temperature
/// and the renamed token-limit field. Adding a future family is a data
/// change here, not a logic change in the request builder.
const CONSTRAINED_DIALECT_PREFIXES: &[&str] = &["gpt-5", "o1", "o3"];

fn dialect_for(model: &str) -> ModelDialect {
    if CONSTRAINED_DIALECT_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
    {
        ModelDialect {
            supports_temperature: false,
            token_limit_field: TokenLimitField::MaxCompletionTokens,
        }
    } else {
        DEFAULT_DIALECT
    }
}

/// Build the chat-completions request body. Pass-through options may
/// override the structural fields; the temperature and token-limit fields
/// are always written last, per the model's dialect.
fn build_request_body(
    model: &str,
    messages: &[ChatMessage],
    options: &GenerationOptions,
) -> serde_json::Map<String, Value> {
    let mut body = serde_json::Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert(
        "messages".to_string(),
        Value::Array(
            messages
                .iter()
                .map(|message| json!({"role": message.role, "content": message.content}))
                .collect(),
        ),
    );
    body.insert("top_p".to_string(), json!(options.top_p_or_default()));

    for (key, value) in &options.extra {
        body.insert(key.clone(), value.clone());
    }

    let dialect = dialect_for(model);
    if dialect.supports_temperature {
        body.insert(
            "temperature".to_string(),
            json!(options.temperature_or_default()),
        );
    } else {
        // Families with a fixed temperature reject the field entirely.
        body.remove("temperature");
    }

    let limit = options.max_tokens_or_default();
    body.remove("max_tokens");
    body.remove("max_completion_tokens");
    body.insert(dialect.token_limit_field.wire_name().to_string(), json!(limit));

    body
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

/// A backend speaking the OpenAI-compatible chat-completions protocol.
pub struct ChatCompletionsClient {
    backend: String,
    base_url: String,
    credential: String,
    /// Extra request headers some backends require for attribution
    /// (OpenRouter's `HTTP-Referer` / `X-Title`).
    extra_headers: Vec<(String, String)>,
}

impl ChatCompletionsClient {
    pub fn new(backend: &str, base_url: &str, credential: &str) -> Self {
        Self {
            backend: backend.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: credential.to_string(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }

    fn http_client(&self) -> Client {
        Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!("Failed to build timeout client: {error}");
                Client::new()
            })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, ProviderError> {
        let body = build_request_body(model, messages, options);

        let mut request = self
            .http_client()
            .post(self.chat_completions_url())
            .bearer_auth(&self.credential)
            .json(&Value::Object(body));
        for (name, value) in &self.extra_headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ProviderError::transport(&self.backend, &error))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = super::parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
            let detail = super::error_message_from_body(&body).unwrap_or(body);
            return Err(ProviderError::with_status(
                status.as_u16(),
                format!("{} API error ({status}): {detail}", self.backend),
            )
            .with_retry_after(retry_after));
        }

        let payload: ApiChatResponse = response.json().await.map_err(|error| {
            ProviderError::new(format!(
                "{} returned an undecodable response: {error}",
                self.backend
            ))
        })?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(CompletionResult {
            content,
            // Backends may alias the requested model; report what they used.
            model: payload.model.unwrap_or_else(|| model.to_string()),
            backend: self.backend.clone(),
            usage: payload.usage.map_or_else(TokenUsage::default, |usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }
}
