//! Route-scoped admission limiting on top of a [`CounterStore`].
//!
//! `RouteRateLimiter` owns the parsed quota (requests per rolling window) and
//! the bucket key, and delegates the atomic increment-and-check to whichever
//! store the pipeline was built with. It is consulted only for requests that
//! already passed authentication.
use std::{num::NonZeroU32, sync::Arc, time::Duration};

use axum::http::{HeaderMap, HeaderName, HeaderValue, header::RETRY_AFTER};
use thiserror::Error;

use crate::{
    config::models::RateLimitConfig,
    ports::{Admission, CounterStore},
};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Why a request was not admitted.
#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("rate limit exceeded: {description}")]
    Exceeded {
        admission: Admission,
        description: String,
    },
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone)]
pub struct RouteRateLimiter {
    store: Arc<dyn CounterStore>,
    key: String,
    limit: NonZeroU32,
    window: Duration,
}

impl RouteRateLimiter {
    /// Build a limiter from a `RateLimitConfig` definition.
    pub fn new(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Result<Self, String> {
        let window = humantime::parse_duration(&config.period).map_err(|e| {
            format!(
                "Invalid period string '{period}': {e}",
                period = config.period
            )
        })?;
        if window.is_zero() {
            return Err("Rate limit 'period' must be greater than 0".to_string());
        }

        let limit = NonZeroU32::new(config.requests)
            .ok_or_else(|| "Rate limit 'requests' must be greater than 0".to_string())?;

        tracing::info!(
            key = %config.key,
            requests = config.requests,
            period = %config.period,
            algorithm = ?config.algorithm,
            "Creating rate limiter"
        );

        Ok(Self {
            store,
            key: config.key.clone(),
            limit,
            window,
        })
    }

    /// Human readable quota, e.g. `10 per 1h`.
    pub fn description(&self) -> String {
        format!(
            "{} per {}",
            self.limit,
            humantime::format_duration(self.window)
        )
    }

    pub fn limit(&self) -> u32 {
        self.limit.get()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count this request against the route bucket.
    pub async fn check(&self) -> Result<Admission, RateLimitError> {
        let admission = self
            .store
            .increment_and_check(&self.key, self.limit.get(), self.window)
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

        if admission.allowed {
            Ok(admission)
        } else {
            Err(RateLimitError::Exceeded {
                admission,
                description: self.description(),
            })
        }
    }
}

/// `X-RateLimit-*` and `Retry-After` headers describing an admission decision.
pub fn rate_limit_headers(admission: &Admission) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(admission.limit));
    if let Some(remaining) = admission.remaining {
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    }
    if let Some(retry_after) = admission.retry_after {
        // Round up so clients never retry a moment too early.
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        headers.insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    headers
}
