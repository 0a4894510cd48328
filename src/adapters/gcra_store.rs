//! GCRA counter store built atop `governor`.
//!
//! Every key gets its own direct limiter with a burst of `limit` cells, one
//! cell replenished every `window / limit`. This smooths admissions instead of
//! resetting the whole quota at once. `governor` performs the check and the
//! state update in a single compare-and-swap, so the store is race free.
use std::{num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use scc::HashMap;

use crate::ports::{Admission, CounterStore, CounterStoreError, CounterStoreResult};

pub type DirectRateLimiterImpl = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limiter instance plus the quota it was built for.
struct KeyLimiter {
    limiter: Arc<DirectRateLimiterImpl>,
    limit: u32,
    window: Duration,
}

#[derive(Default)]
pub struct GcraCounterStore {
    limiters: HashMap<String, KeyLimiter>,
}

impl GcraCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn quota(limit: u32, window: Duration) -> CounterStoreResult<Quota> {
        let burst = NonZeroU32::new(limit)
            .ok_or_else(|| CounterStoreError::InvalidQuota("limit must be > 0".to_string()))?;
        let replenish = window / limit;
        Quota::with_period(replenish)
            .map(|quota| quota.allow_burst(burst))
            .ok_or_else(|| {
                CounterStoreError::InvalidQuota(format!(
                    "window {window:?} is too short for {limit} requests"
                ))
            })
    }

    async fn limiter_for(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> CounterStoreResult<Arc<DirectRateLimiterImpl>> {
        let quota = Self::quota(limit, window)?;
        let mut entry = self
            .limiters
            .entry_async(key.to_string())
            .await
            .or_insert_with(|| KeyLimiter {
                limiter: Arc::new(RateLimiter::direct(quota)),
                limit,
                window,
            });

        let current = entry.get_mut();
        if current.limit != limit || current.window != window {
            tracing::info!(key, limit, ?window, "Rebuilding GCRA limiter for new quota");
            *current = KeyLimiter {
                limiter: Arc::new(RateLimiter::direct(quota)),
                limit,
                window,
            };
        }
        Ok(current.limiter.clone())
    }
}

#[async_trait]
impl CounterStore for GcraCounterStore {
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> CounterStoreResult<Admission> {
        let limiter = self.limiter_for(key, limit, window).await?;

        match limiter.check() {
            Ok(()) => Ok(Admission {
                allowed: true,
                limit,
                remaining: None,
                retry_after: None,
            }),
            Err(not_until) => Ok(Admission {
                allowed: false,
                limit,
                remaining: Some(0),
                retry_after: Some(not_until.wait_time_from(limiter.clock().now())),
            }),
        }
    }
}
