//! Client configuration
//!
//! Code defaults, overridable from the environment and through `with_*`
//! builders.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where the verification backend listens by default.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:4075";

pub const SERVER_URL_ENV: &str = "VERDICT_SERVER_URL";
pub const CONNECT_TIMEOUT_ENV: &str = "VERDICT_CONNECT_TIMEOUT_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "VERDICT_REQUEST_TIMEOUT_SECS";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Backend base URL, without a trailing slash
    pub base_url: String,
    pub verify_path: String,
    pub save_path: String,
    pub config_path: String,
    pub health_path: String,
    pub perturb_path: String,
    pub connect_timeout: Duration,
    /// Total timeout for the short calls. The streaming verify call has no
    /// total timeout.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let base_url =
            std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        HttpClientConfig::new(&base_url)
            .with_connect_timeout(env_secs(CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT))
            .with_request_timeout(env_secs(REQUEST_TIMEOUT_ENV, DEFAULT_REQUEST_TIMEOUT))
    }
}

impl HttpClientConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific server, ignoring the environment
    pub fn new(base_url: &str) -> Self {
        HttpClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            verify_path: "/verify".to_string(),
            save_path: "/save_results".to_string(),
            config_path: "/config".to_string(),
            health_path: "/health".to_string(),
            perturb_path: "/perturb".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("verdict-http/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_verify_path(mut self, path: &str) -> Self {
        self.verify_path = path.to_string();
        self
    }

    pub fn with_save_path(mut self, path: &str) -> Self {
        self.save_path = path.to_string();
        self
    }

    /// Absolute URL for one of the configured paths.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(var = name, value = %raw, "ignoring invalid timeout");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_backend_defaults() {
        let config = HttpClientConfig::new("http://verifier.local:4075/");
        assert_eq!(config.base_url, "http://verifier.local:4075");
        assert_eq!(config.url(&config.verify_path), "http://verifier.local:4075/verify");
        assert_eq!(
            config.url(&config.save_path),
            "http://verifier.local:4075/save_results"
        );
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builders_override_fields() {
        let config = HttpClientConfig::new(DEFAULT_SERVER_URL)
            .with_base_url("https://example.org/api/")
            .with_request_timeout(Duration::from_secs(5))
            .with_user_agent("custom/1.0")
            .with_verify_path("v2/verify");
        assert_eq!(config.url(&config.verify_path), "https://example.org/api/v2/verify");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "custom/1.0");
    }

    #[test]
    fn unset_timeout_uses_default() {
        assert_eq!(
            env_secs("VERDICT_TEST_UNSET_TIMEOUT", Duration::from_secs(3)),
            Duration::from_secs(3)
        );
    }
}
