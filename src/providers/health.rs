//! Backend health probes.
//!
//! Each configured backend gets one minimal low-token completion; the
//! report distinguishes "down", "rate limited", and "not configured".

use super::error::{is_rate_limit_error, ProviderError};
use super::gateway::CompletionGateway;
use super::traits::{ChatMessage, GenerationOptions};
use super::catalog;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Probe outcome for one backend.
#[derive(Debug, Serialize)]
pub struct BackendHealth {
    pub available: bool,
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    pub healthy: usize,
    pub configured: usize,
    pub rate_limited: usize,
}

/// Full health report over every catalog backend.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub providers: BTreeMap<&'static str, BackendHealth>,
    pub summary: HealthSummary,
}

fn probe_options() -> GenerationOptions {
    GenerationOptions {
        temperature: Some(0.0),
        max_tokens: Some(5),
        ..GenerationOptions::default()
    }
}

/// Probe every configured backend with a single minimal completion.
/// Unconfigured backends are reported without issuing any network call.
/// Probes skip the retry loop: a throttled backend reports as rate
/// limited instead of stalling the whole report.
pub async fn probe_all(gateway: &CompletionGateway) -> HealthReport {
    let mut providers = BTreeMap::new();
    let probe_messages = [ChatMessage::user("Say \"ok\"")];
    let options = probe_options();

    for descriptor in catalog::all() {
        let Some(backend) = gateway.registry().get(descriptor.id) else {
            providers.insert(
                descriptor.id,
                BackendHealth {
                    available: false,
                    configured: false,
                    response_time_ms: None,
                    model: None,
                    error: None,
                    rate_limited: None,
                },
            );
            continue;
        };

        let model = backend.default_model();
        let started = Instant::now();
        let outcome = backend
            .client()
            .complete(model, &probe_messages, &options)
            .await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let health = match outcome {
            Ok(_) => BackendHealth {
                available: true,
                configured: true,
                response_time_ms: Some(elapsed_ms),
                model: Some(model.to_string()),
                error: None,
                rate_limited: None,
            },
            Err(error) => {
                tracing::warn!(provider = descriptor.id, error = %error, "Health probe failed");
                backend_failure_health(elapsed_ms, &error)
            }
        };
        providers.insert(descriptor.id, health);
    }

    let healthy = providers.values().filter(|probe| probe.available).count();
    let configured = providers.values().filter(|probe| probe.configured).count();
    let rate_limited = providers
        .values()
        .filter(|probe| probe.rate_limited == Some(true))
        .count();

    HealthReport {
        status: if healthy > 0 { "healthy" } else { "degraded" },
        providers,
        summary: HealthSummary {
            healthy,
            configured,
            rate_limited,
        },
    }
}

fn backend_failure_health(elapsed_ms: u64, error: &ProviderError) -> BackendHealth {
    BackendHealth {
        available: false,
        configured: true,
        response_time_ms: Some(elapsed_ms),
        model: None,
        error: Some(error.message.clone()),
        rate_limited: Some(is_rate_limit_error(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::providers::ProviderRegistry;

    #[tokio::test]
    async fn report_with_nothing_configured_is_degraded() {
        let gateway =
            CompletionGateway::new(ProviderRegistry::from_config(&Config::default()), "groq");
        let report = probe_all(&gateway).await;

        assert_eq!(report.status, "degraded");
        assert_eq!(report.summary.configured, 0);
        assert_eq!(report.summary.healthy, 0);
        assert_eq!(report.providers.len(), catalog::all().len());
        for health in report.providers.values() {
            assert!(!health.available);
            assert!(!health.configured);
            assert!(health.response_time_ms.is_none());
        }
    }

    #[test]
    fn failure_health_classifies_rate_limits() {
        let limited = backend_failure_health(12, &ProviderError::with_status(429, "slow down"));
        assert_eq!(limited.rate_limited, Some(true));
        assert!(!limited.available);
        assert!(limited.configured);

        let broken = backend_failure_health(12, &ProviderError::with_status(401, "bad key"));
        assert_eq!(broken.rate_limited, Some(false));
        assert_eq!(broken.error.as_deref(), Some("bad key"));
    }

    #[test]
    fn probe_options_are_minimal() {
        let options = probe_options();
        assert_eq!(options.max_tokens, Some(5));
        assert!((options.temperature_or_default()).abs() < f64::EPSILON);
    }
}
