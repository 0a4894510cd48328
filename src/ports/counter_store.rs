use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for counter store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CounterStoreError {
    /// The backing store could not be reached
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    /// The requested quota cannot be represented by the store
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),
}

/// Result type for counter store operations
pub type CounterStoreResult<T> = Result<T, CounterStoreError>;

/// Outcome of a single increment-and-check call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether the request was counted and may proceed
    pub allowed: bool,
    /// Configured ceiling for the window
    pub limit: u32,
    /// Slots left in the current window, when the store can tell
    pub remaining: Option<u32>,
    /// How long until a slot frees up (denials only)
    pub retry_after: Option<Duration>,
}

/// CounterStore defines the port for shared admission counters.
///
/// Implementations must make the check and the increment a single atomic
/// step: two concurrent callers may never both observe the last free slot.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Record one request against `key` if fewer than `limit` requests were
    /// admitted within the trailing `window`.
    ///
    /// # Arguments
    /// * `key` - Bucket identity (the route)
    /// * `limit` - Maximum admissions per window
    /// * `window` - Length of the rolling window
    ///
    /// # Returns
    /// The admission decision. Denied requests are not counted.
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> CounterStoreResult<Admission>;
}
