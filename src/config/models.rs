//! Configuration data structures for the keyword gateway.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! to `KEYWORD_GATEWAY__*` environment overrides. Every section carries
//! defaults so that an empty configuration yields a working service that
//! reads its secrets from the process environment.
use serde::{Deserialize, Serialize};

/// Default listen address
fn default_listen_addr() -> String {
    "127.0.0.1:5000".to_string()
}

/// Top-level service configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: HttpServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            upstream: UpstreamConfig::default(),
            logging: LoggingConfig::default(),
            server: HttpServerConfig::default(),
        }
    }
}

/// Bearer authentication settings.
///
/// `api_key` is the application-level secret. When it is unset or empty the
/// environment variable named by `env_var` is consulted instead.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub env_var: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            env_var: "API_KEY".to_string(),
        }
    }
}

/// Algorithm used to enforce the admission quota.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    /// Exact rolling window: at most `requests` admissions in any `period`.
    #[default]
    SlidingWindow,
    /// `governor` GCRA with a burst of `requests` refilled over `period`.
    Gcra,
}

/// Admission quota for the keywords endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub period: String, // Parsed by humantime, e.g., "1s", "5m", "1h"
    /// Counter bucket. The route is used since callers share one secret.
    pub key: String,
    pub algorithm: RateLimitAlgorithm,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            period: "1h".to_string(),
            key: "/keywords".to_string(),
            algorithm: RateLimitAlgorithm::SlidingWindow,
        }
    }
}

/// Settings for the upstream keyword extraction provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_key: Option<String>,
    pub env_var: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            env_var: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-5-nano".to_string(),
            timeout_secs: 60,
            system_prompt: "Analyze the text and extract the best keywords to use for \
                            search engine optimization (SEO)"
                .to_string(),
        }
    }
}

/// Log output settings. `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Maximum accepted request body in bytes
    pub max_body_bytes: usize,
    pub security_headers: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
            security_headers: true,
        }
    }
}
