use std::net::SocketAddr;

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::config::models::{
    AuthConfig, LoggingConfig, RateLimitConfig, ServerConfig, UpstreamConfig,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, collecting every problem
    /// before reporting.
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_auth(&config.auth) {
            errors.push(e);
        }

        if let Err(mut rate_limit_errors) = Self::validate_rate_limit(&config.rate_limit) {
            errors.append(&mut rate_limit_errors);
        }

        if let Err(mut upstream_errors) = Self::validate_upstream(&config.upstream) {
            errors.append(&mut upstream_errors);
        }

        if let Err(e) = Self::validate_logging(&config.logging) {
            errors.push(e);
        }

        if config.server.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "server.max_body_bytes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            }),
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:5000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// The secret itself may legitimately be absent (requests then fail with a
    /// server configuration error), but the fallback variable name may not.
    fn validate_auth(config: &AuthConfig) -> ValidationResult<()> {
        if config.env_var.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "auth.env_var".to_string(),
            });
        }
        Ok(())
    }

    /// Validate rate limit configuration
    fn validate_rate_limit(config: &RateLimitConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if config.requests == 0 {
            errors.push(ValidationError::InvalidField {
                field: "rate_limit.requests".to_string(),
                message: "Rate limit requests must be greater than 0".to_string(),
            });
        }

        match humantime::parse_duration(&config.period) {
            Ok(period) if period.is_zero() => errors.push(ValidationError::InvalidField {
                field: "rate_limit.period".to_string(),
                message: "Period must be greater than zero".to_string(),
            }),
            // The refill interval must be representable for the GCRA store.
            Ok(period) if config.requests > 0 && (period / config.requests).is_zero() => {
                errors.push(ValidationError::InvalidField {
                    field: "rate_limit.period".to_string(),
                    message: format!(
                        "Period is too short to admit {} requests",
                        config.requests
                    ),
                })
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidField {
                field: "rate_limit.period".to_string(),
                message: format!("Period must be a duration like '30s', '5m' or '1h': {e}"),
            }),
        }

        if !config.key.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "rate_limit.key".to_string(),
                message: "Rate limit key must be a route path starting with '/'".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_upstream(config: &UpstreamConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_url(&config.base_url, "upstream.base_url") {
            errors.push(e);
        }

        if config.env_var.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "upstream.env_var".to_string(),
            });
        }

        if config.model.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "upstream.model".to_string(),
            });
        }

        if config.timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "upstream.timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_logging(config: &LoggingConfig) -> ValidationResult<()> {
        EnvFilter::try_new(&config.level)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: format!("Invalid log filter '{}': {e}", config.level),
            })
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
