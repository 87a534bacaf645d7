//! Structured provider and gateway errors.
//!
//! Every backend failure is normalized into a [`ProviderError`] immediately
//! after the call returns, so classification never has to inspect raw
//! transport errors or duck-typed response bodies.

use std::time::Duration;

/// A failure from one backend call: optional HTTP status, sanitized
/// human-readable message, and an optional provider-supplied retry hint.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: super::sanitize_api_error(&message.into()),
            retry_after: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    /// Wrap a transport-level failure (connect error, timeout, bad TLS).
    pub fn transport(backend: &str, error: &reqwest::Error) -> Self {
        Self {
            status: error.status().map(|status| status.as_u16()),
            message: super::sanitize_api_error(&format!("{backend} request failed: {error}")),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, hint: Option<Duration>) -> Self {
        self.retry_after = hint;
        self
    }
}

const RATE_LIMIT_MARKERS: [&str; 4] = [
    "rate limit",
    "too many requests",
    "quota exceeded",
    "rate_limit_exceeded",
];

/// Whether an error represents a transient rate/quota condition worth
/// retrying. Everything else (auth failures, malformed requests, unknown
/// models, network errors) is permanent and must not be retried.
pub fn is_rate_limit_error(error: &ProviderError) -> bool {
    if error.status == Some(429) {
        return true;
    }
    let message = error.message.to_lowercase();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// One failed backend in a fallback chain, kept for the aggregate error.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub backend: String,
    pub error: String,
}

/// Errors surfaced by the completion gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The requested backend has no registered credential. Never retried.
    #[error("backend \"{0}\" is not configured; set its API key environment variable to enable it")]
    NotConfigured(String),

    /// A single backend failed after its retry budget was spent (or failed
    /// permanently on the first attempt).
    #[error("{backend} API error: {source}")]
    Backend {
        backend: String,
        #[source]
        source: ProviderError,
    },

    /// Every candidate backend in a fallback chain failed.
    #[error("all backends failed: {}", summarize_attempts(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },
}

fn summarize_attempts(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "no backends are configured".to_string();
    }
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.backend, attempt.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        let error = ProviderError::with_status(429, "slow down");
        assert!(is_rate_limit_error(&error));
    }

    #[test]
    fn marker_phrases_are_rate_limited_case_insensitively() {
        for message in [
            "Rate Limit exceeded",
            "HTTP 503: TOO MANY REQUESTS",
            "daily quota exceeded for model",
            "error code rate_limit_exceeded",
        ] {
            let error = ProviderError::new(message);
            assert!(is_rate_limit_error(&error), "{message}");
        }
    }

    #[test]
    fn permanent_errors_are_not_rate_limited() {
        for (status, message) in [
            (Some(401), "invalid api key"),
            (Some(400), "model not found"),
            (None, "connection refused"),
            (Some(500), "internal server error"),
        ] {
            let error = ProviderError {
                status,
                message: message.to_string(),
                retry_after: None,
            };
            assert!(!is_rate_limit_error(&error), "{message}");
        }
    }

    #[test]
    fn classification_is_pure() {
        let error = ProviderError::with_status(429, "Rate limit exceeded");
        assert_eq!(is_rate_limit_error(&error), is_rate_limit_error(&error));
    }

    #[test]
    fn retry_after_hint_round_trips() {
        let error =
            ProviderError::with_status(429, "slow down").with_retry_after(Some(Duration::from_secs(7)));
        assert_eq!(error.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn backend_error_names_backend_and_cause() {
        let error = GatewayError::Backend {
            backend: "groq".into(),
            source: ProviderError::new("Rate limit exceeded"),
        };
        let text = error.to_string();
        assert!(text.contains("groq"));
        assert!(text.contains("Rate limit exceeded"));
    }

    #[test]
    fn exhausted_error_lists_every_attempt() {
        let error = GatewayError::Exhausted {
            attempts: vec![
                AttemptFailure {
                    backend: "groq".into(),
                    error: "401 unauthorized".into(),
                },
                AttemptFailure {
                    backend: "openai".into(),
                    error: "rate limit".into(),
                },
            ],
        };
        let text = error.to_string();
        assert!(text.contains("groq"));
        assert!(text.contains("openai"));
        assert!(text.contains("401 unauthorized"));
    }

    #[test]
    fn exhausted_error_with_no_attempts_mentions_missing_configuration() {
        let error = GatewayError::Exhausted { attempts: vec![] };
        assert!(error.to_string().contains("no backends are configured"));
    }
}
