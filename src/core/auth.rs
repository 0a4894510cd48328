//! Bearer token validation.
//!
//! The validator is a pure function of the `Authorization` header and the
//! configured [`ServerSecret`]. Check order is fixed: header presence, scheme
//! prefix, token shape, server configuration, then the value comparison. A
//! caller with a malformed header therefore never learns whether the server
//! has a secret configured.
use std::fmt;

use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{AuthConfig, secrets::resolve_secret_with};

/// Exact scheme prefix, case-sensitive with a single space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Reasons a bearer credential is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingHeader,
    #[error("authorization header does not use the Bearer scheme")]
    MalformedScheme,
    #[error("bearer value is empty or has more than one part")]
    EmptyOrMultiPartToken,
    #[error("no bearer secret configured on the server")]
    ServerMisconfigured,
    #[error("bearer token does not match")]
    InvalidToken,
}

/// Process-wide expected credential. Never printed.
#[derive(Clone, Default)]
pub struct ServerSecret(Option<String>);

impl ServerSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self(secret.filter(|s| !s.is_empty()))
    }

    /// Resolve from configuration, falling back to the configured environment variable.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    pub fn from_config_with<F>(config: &AuthConfig, lookup: F) -> Self
    where
        F: FnOnce(&str) -> Option<String>,
    {
        Self::new(resolve_secret_with(
            config.api_key.as_deref(),
            &config.env_var,
            lookup,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    fn expose(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_configured() { "<redacted>" } else { "<unset>" };
        f.debug_tuple("ServerSecret").field(&state).finish()
    }
}

/// A credential that matched the server secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Compares presented bearer tokens against the server secret.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    secret: ServerSecret,
}

impl TokenValidator {
    pub fn new(secret: ServerSecret) -> Self {
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_configured()
    }

    /// Validate the raw `Authorization` header value.
    pub fn validate(&self, header: Option<&str>) -> Result<Credential, AuthError> {
        let header = header
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingHeader)?;

        if !header.starts_with(BEARER_PREFIX) {
            return Err(AuthError::MalformedScheme);
        }

        // Split on every space, so "Bearer  x" and "Bearer a b" are both rejected.
        let mut parts = header.split(' ');
        let token = match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(token), None) if !token.is_empty() => token,
            _ => return Err(AuthError::EmptyOrMultiPartToken),
        };

        let expected = self.secret.expose().ok_or(AuthError::ServerMisconfigured)?;

        if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(Credential(token.to_string()))
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}
