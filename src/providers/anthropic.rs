//! Anthropic Messages API client.
//!
//! Anthropic does not speak the chat-completions format: the system prompt
//! is a dedicated request field, and usage counts come back under
//! provider-specific names. This client converts both directions.

use crate::providers::error::ProviderError;
use crate::providers::traits::{
    ChatMessage, CompletionClient, CompletionResult, GenerationOptions, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    credential: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicClient {
    pub fn new(credential: &str) -> Self {
        Self::with_base_url(credential, None)
    }

    pub fn with_base_url(credential: &str, base_url: Option<&str>) -> Self {
        Self {
            credential: credential.to_string(),
            base_url: base_url
                .map(|url| url.trim_end_matches('/'))
                .unwrap_or(DEFAULT_BASE_URL)
                .to_string(),
        }
    }

    /// Split out the system prompt (dedicated request field) and map the
    /// remaining messages role-for-role; anything that isn't an assistant
    /// turn becomes a user turn.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
        let mut system = None;
        let mut converted = Vec::new();

        for message in messages {
            match message.role.as_str() {
                "system" => {
                    if system.is_none() {
                        system = Some(message.content.clone());
                    }
                }
                "assistant" => converted.push(WireMessage {
                    role: "assistant",
                    content: message.content.clone(),
                }),
                _ => converted.push(WireMessage {
                    role: "user",
                    content: message.content.clone(),
                }),
            }
        }

        (system, converted)
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
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, ProviderError> {
        let (system, converted) = Self::convert_messages(messages);

        let request = MessagesRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens_or_default(),
            temperature: options.temperature_or_default(),
            system,
            messages: converted,
        };

        let response = self
            .http_client()
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.credential)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|error| ProviderError::transport("anthropic", &error))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = super::parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("Anthropic API error: {status}"));
            return Err(
                ProviderError::with_status(status.as_u16(), detail).with_retry_after(retry_after)
            );
        }

        let payload: MessagesResponse = response.json().await.map_err(|error| {
            ProviderError::new(format!("anthropic returned an undecodable response: {error}"))
        })?;

        let content = payload
            .content
            .first()
            .and_then(|block| block.text.clone())
            .unwrap_or_default();

        let usage = payload.usage.map_or_else(TokenUsage::default, |usage| {
            let total = match (usage.input_tokens, usage.output_tokens) {
                (None, None) => None,
                (input, output) => Some(input.unwrap_or(0) + output.unwrap_or(0)),
            };
            TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: total,
            }
        });

        Ok(CompletionResult {
            content,
            model: payload.model.unwrap_or_else(|| model.to_string()),
            backend: "anthropic".to_string(),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_when_none_provided() {
        let client = AnthropicClient::new("sk-ant-test");
        assert_eq!(client.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn custom_base_url_trims_trailing_slash() {
        let client = AnthropicClient::with_base_url("key", Some("http://localhost:9000/"));
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    #[test]
    fn system_message_becomes_dedicated_field() {
        let (system, converted) = AnthropicClient::convert_messages(&[
            ChatMessage::system("You write SOPs"),
            ChatMessage::user("Generate one"),
        ]);

        assert_eq!(system.as_deref(), Some("You write SOPs"));
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
    }

    #[test]
    fn only_first_system_message_is_kept() {
        let (system, converted) = AnthropicClient::convert_messages(&[
            ChatMessage::system("first"),
            ChatMessage::system("second"),
            ChatMessage::user("hi"),
        ]);

        assert_eq!(system.as_deref(), Some("first"));
        assert_eq!(converted.len(), 1);
    }

    #[test]
    fn assistant_role_is_preserved_everything_else_is_user() {
        let (_, converted) = AnthropicClient::convert_messages(&[
            ChatMessage::user("q"),
            ChatMessage::assistant("a"),
            ChatMessage {
                role: "tool".into(),
                content: "t".into(),
            },
        ]);

        let roles: Vec<&str> = converted.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[test]
    fn request_serializes_without_system_when_absent() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 4000,
            temperature: 0.7,
            system: None,
            messages: vec![WireMessage {
                role: "user",
                content: "hi".into(),
            }],
        };
        let json = serde_json::to_string(&request).unwrap();

        assert!(!json.contains("\"system\""));
        assert!(json.contains("\"max_tokens\":4000"));
    }

    #[test]
    fn response_usage_total_is_sum_of_parts() {
        let body = r#"{
            "content": [{"type": "text", "text": "ok"}],
            "model": "claude-sonnet-4-5-20250929",
            "usage": {"input_tokens": 10, "output_tokens": 3}
        }"#;
        let payload: MessagesResponse = serde_json::from_str(body).unwrap();
        let usage = payload.usage.unwrap();

        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(3));
    }

    #[test]
    fn empty_content_decodes_to_empty_block_list() {
        let payload: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(payload.content.is_empty());
    }
}
