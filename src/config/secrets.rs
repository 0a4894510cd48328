//! Layered secret resolution.
//!
//! A secret is looked up first in the application configuration and then in a
//! plain environment variable. Empty values at either layer count as unset so
//! that `api_key = ""` in a config file falls through to the environment.

/// Resolve a secret from the process environment.
pub fn resolve_secret(app_value: Option<&str>, env_var: &str) -> Option<String> {
    resolve_secret_with(app_value, env_var, |name| std::env::var(name).ok())
}

/// Resolve a secret with an explicit environment lookup.
pub fn resolve_secret_with<F>(app_value: Option<&str>, env_var: &str, lookup: F) -> Option<String>
where
    F: FnOnce(&str) -> Option<String>,
{
    match app_value {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => lookup(env_var).filter(|value| !value.is_empty()),
    }
}
