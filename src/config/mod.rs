//! Environment-driven runtime configuration.
//!
//! Credentials are the only signal that a backend is usable: one
//! `<BACKEND>_API_KEY` variable per backend, absent means unconfigured.
//! Everything is resolved once at startup; the resulting `Config` is
//! handed by reference to the registry and the HTTP server.

use std::collections::HashMap;

/// Default bind address for the HTTP server.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 8080;
/// Backend tried first when a request names none.
pub const DEFAULT_BACKEND: &str = "groq";

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// Preferred backend when a request does not name one.
    pub default_backend: String,
    /// Attribution URL sent to backends that want a referer (OpenRouter).
    pub app_url: Option<String>,
    /// Backend id -> API key. Only backends present here get registered.
    pub credentials: HashMap<String, String>,
    /// Backend id -> base URL override (self-hosted mirrors, tests).
    pub base_urls: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_backend: DEFAULT_BACKEND.to_string(),
            app_url: None,
            credentials: HashMap::new(),
            base_urls: HashMap::new(),
        }
    }
}

impl Config {
    /// Build a config from the process environment.
    ///
    /// Reads `<BACKEND>_API_KEY` and `<BACKEND>_BASE_URL` for every backend
    /// in the catalog, plus `SOPSMITH_HOST`, `SOPSMITH_PORT`,
    /// `SOPSMITH_DEFAULT_PROVIDER`, and `SOPSMITH_APP_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        for descriptor in crate::providers::catalog::all() {
            let env_prefix = descriptor.id.to_uppercase();
            if let Some(key) = read_non_empty_env(&format!("{env_prefix}_API_KEY")) {
                config.credentials.insert(descriptor.id.to_string(), key);
            }
            if let Some(url) = read_non_empty_env(&format!("{env_prefix}_BASE_URL")) {
                config.base_urls.insert(descriptor.id.to_string(), url);
            }
        }

        if let Some(host) = read_non_empty_env("SOPSMITH_HOST") {
            config.host = host;
        }
        if let Some(port) = read_non_empty_env("SOPSMITH_PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(backend) = read_non_empty_env("SOPSMITH_DEFAULT_PROVIDER") {
            config.default_backend = backend;
        }
        config.app_url = read_non_empty_env("SOPSMITH_APP_URL");

        config
    }

    /// Credential for a backend, if configured.
    pub fn credential(&self, backend: &str) -> Option<&str> {
        self.credentials.get(backend).map(String::as_str)
    }

    /// Base URL override for a backend, if configured.
    pub fn base_url(&self, backend: &str) -> Option<&str> {
        self.base_urls.get(backend).map(String::as_str)
    }
}

fn read_non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_backend, "groq");
        assert!(config.credentials.is_empty());
    }

    #[test]
    fn credential_lookup_distinguishes_backends() {
        let mut config = Config::default();
        config
            .credentials
            .insert("groq".to_string(), "gsk-test".to_string());

        assert_eq!(config.credential("groq"), Some("gsk-test"));
        assert_eq!(config.credential("openai"), None);
    }

    #[test]
    fn base_url_override_lookup() {
        let mut config = Config::default();
        config
            .base_urls
            .insert("anthropic".to_string(), "http://localhost:9999".to_string());

        assert_eq!(config.base_url("anthropic"), Some("http://localhost:9999"));
        assert_eq!(config.base_url("groq"), None);
    }
}
