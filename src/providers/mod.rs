//! Multi-provider completion subsystem.
//!
//! The registry probes configuration at startup and keeps a live client per
//! backend that has a credential; the gateway composes those clients with
//! retry, backoff, and cross-backend fallback. Backends without credentials
//! are simply absent from the registry, never errors.

pub mod anthropic;
pub mod backoff;
pub mod catalog;
pub mod compatible;
pub mod error;
pub mod gateway;
pub mod health;
pub mod traits;

pub use error::{is_rate_limit_error, AttemptFailure, GatewayError, ProviderError};
pub use gateway::CompletionGateway;
pub use traits::{
    ChatMessage, CompletionClient, CompletionResult, GenerationOptions, TokenUsage,
};

use crate::config::Config;
use anthropic::AnthropicClient;
use catalog::BackendDescriptor;
use compatible::ChatCompletionsClient;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

const MAX_API_ERROR_CHARS: usize = 500;

/// Wire-format dialect a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtocolFamily {
    /// OpenAI's chat-completions format served by a third party.
    #[serde(rename = "chat-completions-compatible")]
    ChatCompletionsCompatible,
    /// OpenAI's own API.
    #[serde(rename = "native-chat-completions")]
    NativeChatCompletions,
    /// Anthropic's Messages API.
    #[serde(rename = "anthropic-native")]
    AnthropicNative,
}

/// A backend that passed the credential probe: its live client handle plus
/// everything the gateway needs to route to it. Immutable once built.
pub struct RegisteredBackend {
    pub id: &'static str,
    pub protocol: ProtocolFamily,
    pub descriptor: &'static BackendDescriptor,
    client: Box<dyn CompletionClient>,
}

impl RegisteredBackend {
    pub fn client(&self) -> &dyn CompletionClient {
        self.client.as_ref()
    }

    /// Ordered model ids this backend supports.
    pub fn models(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptor.models.iter().map(|model| model.id)
    }

    /// The backend's first (default) model.
    pub fn default_model(&self) -> &'static str {
        self.descriptor
            .models
            .first()
            .map(|model| model.id)
            .unwrap_or("")
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.descriptor.models.iter().any(|entry| entry.id == model)
    }
}

/// Configured backend as reported to API consumers.
#[derive(Debug, Serialize)]
pub struct BackendInfo {
    pub models: Vec<&'static str>,
    #[serde(rename = "type")]
    pub protocol: ProtocolFamily,
    pub info: &'static BackendDescriptor,
}

/// Catalog entry joined with its configuration state, for UI listings.
#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub name: &'static str,
    pub description: &'static str,
    pub free_tier: bool,
    pub free_limit: &'static str,
    pub website: &'static str,
    pub model_count: usize,
    pub configured: bool,
    pub available: bool,
}

/// Live map of backend id -> client handle, built once from configuration.
pub struct ProviderRegistry {
    backends: BTreeMap<&'static str, RegisteredBackend>,
}

impl ProviderRegistry {
    /// Probe the config for credentials and construct a client per usable
    /// backend. Base-URL overrides redirect a backend to a mirror without
    /// changing its protocol.
    pub fn from_config(config: &Config) -> Self {
        let mut backends = BTreeMap::new();

        for descriptor in catalog::all() {
            let Some(credential) = config.credential(descriptor.id) else {
                continue;
            };
            let base_override = config.base_url(descriptor.id);

            let (client, protocol): (Box<dyn CompletionClient>, ProtocolFamily) =
                match descriptor.id {
                    "groq" => (
                        Box::new(ChatCompletionsClient::new(
                            "groq",
                            base_override.unwrap_or("https://api.groq.com/openai/v1"),
                            credential,
                        )),
                        ProtocolFamily::ChatCompletionsCompatible,
                    ),
                    "openrouter" => {
                        let referer = config
                            .app_url
                            .clone()
                            .unwrap_or_else(|| "http://localhost:3000".to_string());
                        (
                            Box::new(
                                ChatCompletionsClient::new(
                                    "openrouter",
                                    base_override.unwrap_or("https://openrouter.ai/api/v1"),
                                    credential,
                                )
                                .with_headers(vec![
                                    ("HTTP-Referer".to_string(), referer),
                                    ("X-Title".to_string(), "sopsmith".to_string()),
                                ]),
                            ),
                            ProtocolFamily::ChatCompletionsCompatible,
                        )
                    }
                    "cerebras" => (
                        Box::new(ChatCompletionsClient::new(
                            "cerebras",
                            base_override.unwrap_or("https://api.cerebras.ai/v1"),
                            credential,
                        )),
                        ProtocolFamily::ChatCompletionsCompatible,
                    ),
                    "together" => (
                        Box::new(ChatCompletionsClient::new(
                            "together",
                            base_override.unwrap_or("https://api.together.xyz/v1"),
                            credential,
                        )),
                        ProtocolFamily::ChatCompletionsCompatible,
                    ),
                    "openai" => (
                        Box::new(ChatCompletionsClient::new(
                            "openai",
                            base_override.unwrap_or("https://api.openai.com/v1"),
                            credential,
                        )),
                        ProtocolFamily::NativeChatCompletions,
                    ),
                    "anthropic" => (
                        Box::new(AnthropicClient::with_base_url(credential, base_override)),
                        ProtocolFamily::AnthropicNative,
                    ),
                    _ => continue,
                };

            backends.insert(
                descriptor.id,
                RegisteredBackend {
                    id: descriptor.id,
                    protocol,
                    descriptor,
                    client,
                },
            );
        }

        tracing::info!(configured = backends.len(), "Provider registry built");
        Self { backends }
    }

    pub fn get(&self, backend: &str) -> Option<&RegisteredBackend> {
        self.backends.get(backend)
    }

    pub fn contains(&self, backend: &str) -> bool {
        self.backends.contains_key(backend)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Configured backends only, keyed by id.
    pub fn available_backends(&self) -> BTreeMap<&'static str, BackendInfo> {
        self.backends
            .values()
            .map(|backend| {
                (
                    backend.id,
                    BackendInfo {
                        models: backend.models().collect(),
                        protocol: backend.protocol,
                        info: backend.descriptor,
                    },
                )
            })
            .collect()
    }

    /// Every catalog backend, configured or not, annotated with its state.
    pub fn all_backends_info(&self) -> BTreeMap<&'static str, BackendStatus> {
        catalog::all()
            .iter()
            .map(|descriptor| {
                let configured = self.contains(descriptor.id);
                (
                    descriptor.id,
                    BackendStatus {
                        name: descriptor.name,
                        description: descriptor.description,
                        free_tier: descriptor.free_tier,
                        free_limit: descriptor.free_limit,
                        website: descriptor.website,
                        model_count: descriptor.models.len(),
                        configured,
                        available: configured,
                    },
                )
            })
            .collect()
    }
}

// ── Shared error-plumbing helpers ───────────────────────────────

/// Parse a numeric `Retry-After` response header into a duration hint.
/// HTTP-date values are ignored; no backend in the catalog sends them.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds.min(3600.0)))
    } else {
        None
    }
}

/// Extract a human-readable message from a JSON error body. Handles both
/// `{"error": {"message": "..."}}` and `{"error": "..."}` envelopes.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(message) => Some(message.clone()),
        detail => detail
            .get("message")
            .and_then(|message| message.as_str())
            .map(str::to_string),
    }
}

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub secret-like tokens from provider error strings before they can
/// reach logs or aggregate error messages.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [(&str, usize); 7] = [
        ("sk-", 1),
        ("gsk_", 1),
        ("\"api_key\":\"", 8),
        ("api_key=", 8),
        ("access_token=", 8),
        ("Bearer ", 16),
        ("bearer ", 16),
    ];

    let mut scrubbed = input.to_string();

    for (prefix, min_len) in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);
            let token_len = end.saturating_sub(content_start);

            // Bare prefixes like "sk-" should not stop future scans.
            if token_len < min_len {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(backends: &[&str]) -> Config {
        let mut config = Config::default();
        for backend in backends {
            config
                .credentials
                .insert((*backend).to_string(), format!("{backend}-test-key"));
        }
        config
    }

    #[test]
    fn registry_without_credentials_is_empty() {
        let registry = ProviderRegistry::from_config(&Config::default());
        assert!(registry.is_empty());
        assert!(registry.available_backends().is_empty());
    }

    #[test]
    fn registry_omits_unconfigured_backends() {
        let registry = ProviderRegistry::from_config(&config_with(&["groq", "anthropic"]));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("groq"));
        assert!(registry.contains("anthropic"));
        assert!(!registry.contains("openai"));
        assert!(registry.get("openrouter").is_none());
    }

    #[test]
    fn registry_tags_protocol_families() {
        let registry =
            ProviderRegistry::from_config(&config_with(&["groq", "openai", "anthropic"]));

        assert_eq!(
            registry.get("groq").unwrap().protocol,
            ProtocolFamily::ChatCompletionsCompatible
        );
        assert_eq!(
            registry.get("openai").unwrap().protocol,
            ProtocolFamily::NativeChatCompletions
        );
        assert_eq!(
            registry.get("anthropic").unwrap().protocol,
            ProtocolFamily::AnthropicNative
        );
    }

    #[test]
    fn registered_backend_exposes_catalog_models() {
        let registry = ProviderRegistry::from_config(&config_with(&["groq"]));
        let backend = registry.get("groq").unwrap();

        assert_eq!(backend.default_model(), "llama-3.3-70b-versatile");
        assert!(backend.supports_model("llama-3.1-8b-instant"));
        assert!(!backend.supports_model("gpt-5"));
    }

    #[test]
    fn all_backends_info_includes_unconfigured_entries() {
        let registry = ProviderRegistry::from_config(&config_with(&["groq"]));
        let info = registry.all_backends_info();

        assert_eq!(info.len(), catalog::all().len());
        assert!(info["groq"].configured);
        assert!(!info["openai"].configured);
        assert!(!info["openai"].available);
    }

    #[test]
    fn protocol_family_serializes_to_wire_tags() {
        assert_eq!(
            serde_json::to_string(&ProtocolFamily::ChatCompletionsCompatible).unwrap(),
            "\"chat-completions-compatible\""
        );
        assert_eq!(
            serde_json::to_string(&ProtocolFamily::AnthropicNative).unwrap(),
            "\"anthropic-native\""
        );
    }

    #[test]
    fn parse_retry_after_reads_numeric_seconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
    }

    #[test]
    fn parse_retry_after_rejects_garbage() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);

        let empty = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&empty), None);
    }

    #[test]
    fn error_message_from_nested_envelope() {
        let body = r#"{"error": {"message": "Rate limit exceeded", "type": "rate_limit_error"}}"#;
        assert_eq!(
            error_message_from_body(body).as_deref(),
            Some("Rate limit exceeded")
        );
    }

    #[test]
    fn error_message_from_string_envelope() {
        assert_eq!(
            error_message_from_body(r#"{"error": "quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
    }

    #[test]
    fn error_message_from_unparsable_body_is_none() {
        assert_eq!(error_message_from_body("<html>502</html>"), None);
        assert_eq!(error_message_from_body(r#"{"detail": "nope"}"#), None);
    }

    #[test]
    fn scrub_redacts_bearer_and_key_prefixes() {
        let input = "401 from upstream: Bearer sk-abc123def456ghi789 rejected, api_key=gsk_superSecretValue1";
        let scrubbed = scrub_secret_patterns(input);

        assert!(!scrubbed.contains("abc123def456ghi789"));
        assert!(!scrubbed.contains("superSecretValue1"));
        assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let long = "x".repeat(2000);
        let sanitized = sanitize_api_error(&long);
        assert!(sanitized.len() <= MAX_API_ERROR_CHARS + 3);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn sanitize_keeps_short_messages_intact() {
        assert_eq!(sanitize_api_error("model not found"), "model not found");
    }
}
