//! Retry budgets, exponential backoff with jitter, and the shared
//! rate-limit cool-down store.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Jitter added to each computed delay, in milliseconds. Uniform random in
/// `[0, 1000)` so concurrent requests don't retry in lockstep.
pub const JITTER_MS: u64 = 1000;

/// Per-backend retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Budget for backends without an explicit table entry.
pub const DEFAULT_POLICY: RetryPolicy = RetryPolicy {
    max_retries: 3,
    base_delay_ms: 1000,
    max_delay_ms: 30_000,
};

/// Retry budget for a backend. Groq's free tier throttles aggressively, so
/// it gets more attempts with a longer base delay.
pub fn retry_policy(backend: &str) -> RetryPolicy {
    match backend {
        "openai" | "anthropic" => RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        },
        "groq" => RetryPolicy {
            max_retries: 5,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
        },
        _ => DEFAULT_POLICY,
    }
}

/// Backoff delay for `attempt` with an explicit jitter value:
/// `min(base * 2^attempt + jitter, max)`, in whole milliseconds.
pub fn delay_with_jitter(attempt: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_ms.saturating_mul(1u64 << attempt.min(20));
    exponential.saturating_add(jitter_ms).min(max_ms)
}

/// Backoff delay for `attempt` under `policy`, with sampled jitter.
pub fn backoff_delay(attempt: u32, policy: &RetryPolicy) -> u64 {
    let jitter = rand::random_range(0..JITTER_MS);
    delay_with_jitter(attempt, policy.base_delay_ms, policy.max_delay_ms, jitter)
}

#[derive(Debug, Clone)]
struct CooldownEntry {
    until: Instant,
    last_error: String,
}

/// Advisory rate-limit state shared across concurrent requests.
///
/// One entry per backend: a retry-not-before deadline plus the error that
/// caused it. Entries expire lazily on read and are cleared on the next
/// successful call to that backend. Staleness is tolerable; the map is a
/// hint, not a correctness mechanism.
#[derive(Default)]
pub struct CooldownStore {
    entries: Mutex<HashMap<String, CooldownEntry>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining cool-down and last error for a backend, if still active.
    pub fn get(&self, backend: &str) -> Option<(Duration, String)> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        match entries.get(backend) {
            Some(entry) if now < entry.until => {
                Some((entry.until - now, entry.last_error.clone()))
            }
            Some(_) => {
                entries.remove(backend);
                None
            }
            None => None,
        }
    }

    /// Record a cool-down window after a rate-limit error.
    pub fn set(&self, backend: &str, duration: Duration, last_error: impl Into<String>) {
        self.entries.lock().insert(
            backend.to_string(),
            CooldownEntry {
                until: Instant::now() + duration,
                last_error: last_error.into(),
            },
        );
    }

    /// Clear a backend's cool-down (on success).
    pub fn clear(&self, backend: &str) {
        self.entries.lock().remove(backend);
    }

    /// Number of active cool-downs (for observability).
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|_, entry| entry.until > now);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn delay_grows_exponentially_before_clamp() {
        assert_eq!(delay_with_jitter(0, 1000, 60_000, 0), 1000);
        assert_eq!(delay_with_jitter(1, 1000, 60_000, 0), 2000);
        assert_eq!(delay_with_jitter(2, 1000, 60_000, 0), 4000);
        assert_eq!(delay_with_jitter(3, 1000, 60_000, 0), 8000);
    }

    #[test]
    fn delay_is_bounded_by_jitter_window() {
        for attempt in 0..4 {
            let base = 1000u64 << attempt;
            assert_eq!(delay_with_jitter(attempt, 1000, 60_000, 0), base);
            assert_eq!(delay_with_jitter(attempt, 1000, 60_000, 999), base + 999);
        }
    }

    #[test]
    fn delay_clamps_to_max() {
        assert_eq!(delay_with_jitter(10, 1000, 30_000, 999), 30_000);
        assert_eq!(delay_with_jitter(0, 50_000, 30_000, 0), 30_000);
    }

    #[test]
    fn delay_survives_huge_attempt_counts() {
        // Shift amount is capped, so this must not overflow.
        assert_eq!(delay_with_jitter(u32::MAX, 1000, 30_000, 0), 30_000);
    }

    #[test]
    fn sampled_delay_stays_within_bounds() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 60_000,
        };
        for attempt in 0..4 {
            let delay = backoff_delay(attempt, &policy);
            let floor = 100u64 << attempt;
            assert!(delay >= floor, "attempt {attempt}: {delay} < {floor}");
            assert!(delay < floor + JITTER_MS);
        }
    }

    #[test]
    fn policy_table_has_per_backend_budgets() {
        assert_eq!(retry_policy("groq").max_retries, 5);
        assert_eq!(retry_policy("openai").max_delay_ms, 60_000);
        assert_eq!(retry_policy("together"), DEFAULT_POLICY);
        assert_eq!(retry_policy("unknown-backend"), DEFAULT_POLICY);
    }

    #[test]
    fn cooldown_stores_and_expires() {
        let store = CooldownStore::new();
        store.set("groq", Duration::from_millis(40), "Rate limit exceeded");

        let (remaining, error) = store.get("groq").expect("entry should be active");
        assert!(remaining <= Duration::from_millis(40));
        assert_eq!(error, "Rate limit exceeded");

        thread::sleep(Duration::from_millis(50));
        assert!(store.get("groq").is_none());
    }

    #[test]
    fn cooldown_clears_on_demand() {
        let store = CooldownStore::new();
        store.set("openai", Duration::from_secs(30), "429");
        assert!(!store.is_empty());

        store.clear("openai");
        assert!(store.get("openai").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn cooldowns_are_independent_per_backend() {
        let store = CooldownStore::new();
        store.set("groq", Duration::from_secs(30), "limited");

        assert!(store.get("groq").is_some());
        assert!(store.get("cerebras").is_none());
    }
}
