//! In-memory rolling-window counter store.
//!
//! Each key owns a log of admission instants, never longer than the limit.
//! The log lives inside an `scc::HashMap` entry; holding the entry locks its
//! bucket, so pruning, checking and recording happen as one atomic step even
//! when many requests race for the last slot.
use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use scc::HashMap;
use tokio::time::Instant;

use crate::ports::{Admission, CounterStore, CounterStoreResult};

#[derive(Default)]
pub struct SlidingWindowCounterStore {
    buckets: HashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with live state.
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl CounterStore for SlidingWindowCounterStore {
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> CounterStoreResult<Admission> {
        let now = Instant::now();
        let mut entry = self.buckets.entry_async(key.to_string()).await.or_default();
        let log = entry.get_mut();

        while log
            .front()
            .is_some_and(|admitted| now.duration_since(*admitted) >= window)
        {
            log.pop_front();
        }

        let used = u32::try_from(log.len()).unwrap_or(u32::MAX);
        if used >= limit {
            let retry_after = log
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)));
            return Ok(Admission {
                allowed: false,
                limit,
                remaining: Some(0),
                retry_after,
            });
        }

        log.push_back(now);
        Ok(Admission {
            allowed: true,
            limit,
            remaining: Some(limit - used - 1),
            retry_after: None,
        })
    }
}
