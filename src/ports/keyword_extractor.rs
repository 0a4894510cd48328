use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keywords produced by the upstream provider. Passed to callers unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub keywords: Vec<String>,
}

/// Failure kinds surfaced by a keyword extractor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractionError {
    /// The extractor itself is not configured (e.g. missing provider credential)
    #[error("{0}")]
    Configuration(String),

    /// Any other failure: transport, provider error, malformed response
    #[error("{0}")]
    Upstream(String),
}

/// Result type alias for extraction calls
pub type ExtractionOutcome = Result<ExtractionResult, ExtractionError>;

/// KeywordExtractor defines the port for the external text-analysis capability
#[async_trait]
pub trait KeywordExtractor: Send + Sync + 'static {
    /// Extract keywords from `text`. Called once per admitted request; no retries.
    async fn extract(&self, text: &str) -> ExtractionOutcome;
}
