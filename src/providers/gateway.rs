//! Completion gateway: single-backend retry and cross-backend fallback.
//!
//! Attempts are strictly sequential. Within one backend, retries happen in
//! increasing attempt order with exponential backoff; across backends, the
//! fallback chain runs in a fixed priority order and stops at the first
//! success. Backends are never raced in parallel — every extra attempt is
//! consumed quota somewhere.

use super::backoff::{backoff_delay, retry_policy, CooldownStore, RetryPolicy};
use super::error::{is_rate_limit_error, AttemptFailure, GatewayError, ProviderError};
use super::traits::{ChatMessage, CompletionResult, GenerationOptions};
use super::ProviderRegistry;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Fixed fallback sequence tried after the preferred backend: free-tier
/// backends first, then free-credit and paid-free-tier ones, fully paid
/// backends last.
const FALLBACK_ORDER: [&str; 6] = [
    "groq",
    "cerebras",
    "openrouter",
    "together",
    "openai",
    "anthropic",
];

/// Longest wait a provider-supplied Retry-After hint is honored for.
const MAX_RETRY_AFTER_MS: u64 = 30_000;

pub struct CompletionGateway {
    registry: ProviderRegistry,
    cooldowns: CooldownStore,
    policy_overrides: HashMap<String, RetryPolicy>,
    default_backend: String,
}

impl CompletionGateway {
    pub fn new(registry: ProviderRegistry, default_backend: impl Into<String>) -> Self {
        Self {
            registry,
            cooldowns: CooldownStore::new(),
            policy_overrides: HashMap::new(),
            default_backend: default_backend.into(),
        }
    }

    /// Override the retry budget for one backend.
    pub fn with_policy(mut self, backend: &str, policy: RetryPolicy) -> Self {
        self.policy_overrides.insert(backend.to_string(), policy);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    fn policy(&self, backend: &str) -> RetryPolicy {
        self.policy_overrides
            .get(backend)
            .copied()
            .unwrap_or_else(|| retry_policy(backend))
    }

    /// Delay before the next retry: a provider-supplied Retry-After hint
    /// when present (clamped), otherwise exponential backoff with jitter.
    fn retry_delay_ms(attempt: u32, policy: &RetryPolicy, error: &ProviderError) -> u64 {
        match error.retry_after {
            Some(hint) => u64::try_from(hint.as_millis())
                .unwrap_or(u64::MAX)
                .min(MAX_RETRY_AFTER_MS)
                .max(policy.base_delay_ms),
            None => backoff_delay(attempt, policy),
        }
    }

    /// Complete on one specific backend, retrying transient rate-limit
    /// failures up to the backend's budget. Fails immediately if the
    /// backend is not registered or the error is permanent.
    pub async fn complete_on(
        &self,
        backend_id: &str,
        model: Option<&str>,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, GatewayError> {
        let backend = self
            .registry
            .get(backend_id)
            .ok_or_else(|| GatewayError::NotConfigured(backend_id.to_string()))?;

        let model = model
            .filter(|requested| !requested.is_empty())
            .unwrap_or_else(|| backend.default_model());
        let policy = self.policy(backend_id);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=policy.max_retries {
            if let Some((remaining, cause)) = self.cooldowns.get(backend_id) {
                tracing::info!(
                    provider = backend_id,
                    wait_ms = remaining.as_millis() as u64,
                    cause = %cause,
                    "Backend cooling down, waiting before attempt"
                );
                tokio::time::sleep(remaining).await;
            }

            match backend.client().complete(model, messages, options).await {
                Ok(result) => {
                    self.cooldowns.clear(backend_id);
                    if attempt > 0 {
                        tracing::info!(
                            provider = backend_id,
                            model,
                            attempt,
                            "Backend recovered after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if is_rate_limit_error(&error) {
                        let wait_ms = Self::retry_delay_ms(attempt, &policy, &error);
                        self.cooldowns.set(
                            backend_id,
                            Duration::from_millis(wait_ms),
                            error.message.clone(),
                        );

                        if attempt < policy.max_retries {
                            tracing::warn!(
                                provider = backend_id,
                                model,
                                attempt = attempt + 1,
                                max_attempts = policy.max_retries + 1,
                                backoff_ms = wait_ms,
                                error = %error,
                                "Rate limited, retrying after backoff"
                            );
                            last_error = Some(error);
                            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                            continue;
                        }

                        tracing::warn!(
                            provider = backend_id,
                            model,
                            error = %error,
                            "Rate-limit retry budget exhausted"
                        );
                    } else {
                        tracing::warn!(
                            provider = backend_id,
                            model,
                            error = %error,
                            "Permanent error, not retrying"
                        );
                    }

                    last_error = Some(error);
                    break;
                }
            }
        }

        Err(GatewayError::Backend {
            backend: backend_id.to_string(),
            source: last_error
                .unwrap_or_else(|| ProviderError::new("request was never attempted")),
        })
    }

    /// Candidate order for a fallback chain: preferred backend first, then
    /// the fixed sequence, duplicates and unregistered backends dropped.
    fn fallback_candidates<'a>(&self, preferred: &'a str) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        std::iter::once(preferred)
            .chain(FALLBACK_ORDER)
            .filter(|backend_id| seen.insert(*backend_id) && self.registry.contains(backend_id))
            .collect()
    }

    /// Complete on the best available backend, trying others on failure.
    /// First success wins; exhaustion produces an aggregate error naming
    /// every backend tried and why it failed.
    pub async fn complete_with_fallback(
        &self,
        preferred: Option<&str>,
        model: Option<&str>,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<CompletionResult, GatewayError> {
        let preferred = preferred
            .filter(|backend| !backend.is_empty())
            .unwrap_or(self.default_backend.as_str());
        let candidates = self.fallback_candidates(preferred);
        let total = candidates.len();
        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for (index, backend_id) in candidates.iter().copied().enumerate() {
            // A cooling-down backend is deprioritized, but a last-resort
            // candidate is always attempted rather than failing outright.
            let is_last = index + 1 == total;
            if !is_last {
                if let Some((remaining, cause)) = self.cooldowns.get(backend_id) {
                    tracing::info!(
                        provider = backend_id,
                        remaining_ms = remaining.as_millis() as u64,
                        "Skipping backend in rate-limit cool-down"
                    );
                    attempts.push(AttemptFailure {
                        backend: backend_id.to_string(),
                        error: format!("skipped: cooling down after rate limit ({cause})"),
                    });
                    continue;
                }
            }

            let Some(backend) = self.registry.get(backend_id) else {
                continue;
            };

            // Model ids are not portable across backends.
            let selected_model = match model {
                Some(requested) if backend.supports_model(requested) => requested,
                _ => backend.default_model(),
            };

            tracing::info!(provider = backend_id, model = selected_model, "Trying backend");
            match self
                .complete_on(backend_id, Some(selected_model), messages, options)
                .await
            {
                Ok(result) => return Ok(result),
                Err(error) => {
                    tracing::warn!(
                        provider = backend_id,
                        error = %error,
                        "Backend failed, trying next candidate"
                    );
                    attempts.push(AttemptFailure {
                        backend: backend_id.to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }

        Err(GatewayError::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::providers::ProviderRegistry;

    fn gateway_with(backends: &[&str]) -> CompletionGateway {
        let mut config = Config::default();
        for backend in backends {
            config
                .credentials
                .insert((*backend).to_string(), "test-key".to_string());
        }
        CompletionGateway::new(ProviderRegistry::from_config(&config), "groq")
    }

    #[tokio::test]
    async fn unconfigured_backend_fails_immediately() {
        let gateway = gateway_with(&[]);
        let error = gateway
            .complete_on("openai", None, &[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();

        match error {
            GatewayError::NotConfigured(backend) => assert_eq!(backend, "openai"),
            other => panic!("expected NotConfigured, got {other}"),
        }
    }

    #[tokio::test]
    async fn fallback_with_nothing_configured_exhausts_with_empty_attempts() {
        let gateway = gateway_with(&[]);
        let error = gateway
            .complete_with_fallback(
                None,
                None,
                &[ChatMessage::user("hi")],
                &GenerationOptions::default(),
            )
            .await
            .unwrap_err();

        match error {
            GatewayError::Exhausted { attempts } => assert!(attempts.is_empty()),
            other => panic!("expected Exhausted, got {other}"),
        }
    }

    #[test]
    fn candidates_put_preferred_first_and_dedup() {
        let gateway = gateway_with(&["groq", "cerebras", "openai"]);

        let candidates = gateway.fallback_candidates("openai");
        assert_eq!(candidates, vec!["openai", "groq", "cerebras"]);

        // Preferred coincides with the fixed sequence: no duplicate entry.
        let candidates = gateway.fallback_candidates("groq");
        assert_eq!(candidates, vec!["groq", "cerebras", "openai"]);
    }

    #[test]
    fn candidates_skip_unregistered_backends() {
        let gateway = gateway_with(&["together"]);
        assert_eq!(gateway.fallback_candidates("openai"), vec!["together"]);
    }

    #[test]
    fn policy_override_replaces_table_entry() {
        let custom = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 5,
            max_delay_ms: 10,
        };
        let gateway = gateway_with(&["groq"]).with_policy("groq", custom);

        assert_eq!(gateway.policy("groq"), custom);
        assert_eq!(gateway.policy("openai"), retry_policy("openai"));
    }

    #[test]
    fn retry_delay_prefers_clamped_hint() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        };

        let hinted = ProviderError::with_status(429, "slow down")
            .with_retry_after(Some(Duration::from_secs(2)));
        assert_eq!(
            CompletionGateway::retry_delay_ms(0, &policy, &hinted),
            2000
        );

        // Hints are capped so a hostile header cannot stall the gateway.
        let excessive = ProviderError::with_status(429, "slow down")
            .with_retry_after(Some(Duration::from_secs(600)));
        assert_eq!(
            CompletionGateway::retry_delay_ms(0, &policy, &excessive),
            MAX_RETRY_AFTER_MS
        );

        // Sub-base hints are raised to the backend's base delay.
        let tiny = ProviderError::with_status(429, "slow down")
            .with_retry_after(Some(Duration::from_millis(1)));
        assert_eq!(CompletionGateway::retry_delay_ms(0, &policy, &tiny), 1000);
    }
}
