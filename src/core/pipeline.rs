//! The request-admission pipeline for `POST /keywords`.
//!
//! Stages run in a fixed order, each either handing its output to the next
//! stage or ending the request with an [`ApiError`]:
//!
//! ```text
//! Start -> AuthChecked -> RateChecked -> TextNormalized -> UpstreamCalled -> Responded
//! ```
//!
//! Any failure jumps straight to `Responded`. Authentication always precedes
//! the rate limiter, so rejected callers never consume a slot. It reads
//! headers only, which lets the HTTP layer run it before the body is read;
//! the returned [`Credential`] is required to run the remaining stages. All
//! collaborators are injected through [`AdmissionPipeline::new`].
use std::{borrow::Cow, fmt, sync::Arc};

use axum::{
    Json,
    http::{
        HeaderMap, HeaderName,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::{
    config::models::ServerConfig,
    core::{
        auth::{Credential, ServerSecret, TokenValidator},
        error::ApiError,
        normalizer::{self, InboundText},
        rate_limiter::{RateLimitError, RouteRateLimiter, rate_limit_headers},
    },
    ports::{Admission, CounterStore, ExtractionResult, KeywordExtractor},
};

/// Position of a request in the admission state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    AuthChecked,
    RateChecked,
    TextNormalized,
    UpstreamCalled,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::AuthChecked => "auth_checked",
            Stage::RateChecked => "rate_checked",
            Stage::TextNormalized => "text_normalized",
            Stage::UpstreamCalled => "upstream_called",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Borrowed view of the parts of an HTTP request the pipeline reads.
pub struct InboundRequest<'a> {
    pub authorization: Option<Cow<'a, str>>,
    pub content_type: Option<Cow<'a, str>>,
    pub body: &'a [u8],
}

impl<'a> InboundRequest<'a> {
    pub fn from_parts(headers: &'a HeaderMap, body: &'a [u8]) -> Self {
        Self {
            authorization: header_lossy(headers, AUTHORIZATION),
            content_type: header_lossy(headers, CONTENT_TYPE),
            body,
        }
    }
}

/// Successful pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub result: ExtractionResult,
    pub admission: Admission,
}

impl IntoResponse for Extraction {
    fn into_response(self) -> Response {
        (rate_limit_headers(&self.admission), Json(self.result)).into_response()
    }
}

pub struct AdmissionPipeline {
    validator: TokenValidator,
    rate_limiter: RouteRateLimiter,
    extractor: Arc<dyn KeywordExtractor>,
}

impl AdmissionPipeline {
    pub fn new(
        validator: TokenValidator,
        rate_limiter: RouteRateLimiter,
        extractor: Arc<dyn KeywordExtractor>,
    ) -> Self {
        Self {
            validator,
            rate_limiter,
            extractor,
        }
    }

    /// Wire a pipeline from configuration. The server secret is resolved
    /// here, once; a missing secret still yields a pipeline that answers
    /// every request with a server configuration error.
    pub fn from_config(
        config: &ServerConfig,
        store: Arc<dyn CounterStore>,
        extractor: Arc<dyn KeywordExtractor>,
    ) -> eyre::Result<Self> {
        let validator = TokenValidator::new(ServerSecret::from_config(&config.auth));
        if !validator.is_configured() {
            tracing::warn!(
                env_var = %config.auth.env_var,
                "No server API key configured; all keyword requests will fail"
            );
        }
        let rate_limiter = RouteRateLimiter::new(&config.rate_limit, store)
            .map_err(|e| eyre::eyre!("Invalid rate limit configuration: {e}"))?;
        Ok(Self::new(validator, rate_limiter, extractor))
    }

    pub fn rate_limiter(&self) -> &RouteRateLimiter {
        &self.rate_limiter
    }

    /// Header-only authentication stage. Runs before the body is read, so
    /// unauthenticated callers are rejected whatever they send.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Credential, ApiError> {
        let authorization = header_lossy(headers, AUTHORIZATION);
        self.check_auth(authorization.as_deref())
    }

    /// Run one request through every stage and render the outcome.
    pub async fn handle(&self, request: InboundRequest<'_>) -> Response {
        render(self.run(request).await)
    }

    /// Run the post-authentication stages for a caller that already passed
    /// [`AdmissionPipeline::authenticate`].
    pub async fn handle_authenticated(
        &self,
        credential: &Credential,
        request: InboundRequest<'_>,
    ) -> Response {
        render(self.run_authenticated(credential, request).await)
    }

    /// Run the stages, stopping at the first failure.
    pub async fn run(&self, request: InboundRequest<'_>) -> Result<Extraction, ApiError> {
        let credential = self.check_auth(request.authorization.as_deref())?;
        self.run_authenticated(&credential, request).await
    }

    pub async fn run_authenticated(
        &self,
        _credential: &Credential,
        request: InboundRequest<'_>,
    ) -> Result<Extraction, ApiError> {
        let mut stage = Stage::AuthChecked;

        let result = self.run_admitted_stages(&request, &mut stage).await;
        if let Err(err) = &result {
            tracing::debug!(stopped_after = %stage, error = %err, "admission short-circuited");
        }
        result
    }

    fn check_auth(&self, authorization: Option<&str>) -> Result<Credential, ApiError> {
        let credential = self.validator.validate(authorization).inspect_err(|err| {
            tracing::debug!(stopped_after = %Stage::Start, error = %err, "admission short-circuited");
        })?;
        tracing::trace!(from = %Stage::Start, to = %Stage::AuthChecked, "admission stage passed");
        Ok(credential)
    }

    async fn run_admitted_stages(
        &self,
        request: &InboundRequest<'_>,
        stage: &mut Stage,
    ) -> Result<Extraction, ApiError> {
        let admission = self.rate_limiter.check().await.inspect_err(|err| {
            if let RateLimitError::Exceeded { description, .. } = err {
                tracing::info!(quota = %description, "rate limit exceeded");
            }
        })?;
        advance(stage, Stage::RateChecked);

        let text: InboundText =
            normalizer::normalize(request.content_type.as_deref(), request.body)
                .map_err(|_| ApiError::NoTextProvided)?;
        advance(stage, Stage::TextNormalized);

        let result = self.extractor.extract(text.as_str()).await?;
        advance(stage, Stage::UpstreamCalled);

        Ok(Extraction { result, admission })
    }
}

fn render(outcome: Result<Extraction, ApiError>) -> Response {
    let response = match outcome {
        Ok(extraction) => extraction.into_response(),
        Err(err) => err.into_response(),
    };
    tracing::debug!(stage = %Stage::Responded, status = %response.status());
    response
}

/// Header values that are not valid UTF-8 are decoded lossily; they still
/// go through every validation rule.
fn header_lossy(headers: &HeaderMap, name: HeaderName) -> Option<Cow<'_, str>> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

fn advance(stage: &mut Stage, next: Stage) {
    debug_assert!(next > *stage, "admission stages only move forward");
    tracing::trace!(from = %stage, to = %next, "admission stage passed");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};

    use super::*;
    use crate::{
        adapters::SlidingWindowCounterStore,
        config::RateLimitConfig,
        core::auth::AuthError,
        ports::{ExtractionError, ExtractionOutcome},
    };

    struct CountingExtractor {
        calls: AtomicUsize,
        outcome: ExtractionOutcome,
    }

    #[async_trait]
    impl KeywordExtractor for CountingExtractor {
        async fn extract(&self, _text: &str) -> ExtractionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn pipeline(
        secret: Option<&str>,
        outcome: ExtractionOutcome,
    ) -> (AdmissionPipeline, Arc<CountingExtractor>) {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
            outcome,
        });
        let limiter = RouteRateLimiter::new(
            &RateLimitConfig::default(),
            Arc::new(SlidingWindowCounterStore::new()),
        )
        .unwrap();
        let validator = TokenValidator::new(ServerSecret::new(secret.map(str::to_string)));
        (
            AdmissionPipeline::new(validator, limiter, extractor.clone()),
            extractor,
        )
    }

    fn ok_outcome() -> ExtractionOutcome {
        Ok(ExtractionResult {
            keywords: vec!["fox".to_string(), "quick".to_string()],
        })
    }

    fn request<'a>(auth: Option<&'a str>, body: &'a [u8]) -> InboundRequest<'a> {
        InboundRequest {
            authorization: auth.map(Cow::Borrowed),
            content_type: Some(Cow::Borrowed("application/json")),
            body,
        }
    }

    #[tokio::test]
    async fn test_success_passes_result_through() {
        let (pipeline, extractor) = pipeline(Some("key"), ok_outcome());
        let extraction = pipeline
            .run(request(Some("Bearer key"), br#"{"text": "The quick brown fox"}"#))
            .await
            .unwrap();
        assert_eq!(extraction.result.keywords, vec!["fox", "quick"]);
        assert_eq!(extraction.admission.remaining, Some(9));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_failures_do_not_consume_slots() {
        let (pipeline, extractor) = pipeline(Some("key"), ok_outcome());
        for _ in 0..15 {
            let err = pipeline
                .run(request(Some("Bearer wrong"), br#"{"text": "x"}"#))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Auth(AuthError::InvalidToken)));
        }
        let extraction = pipeline
            .run(request(Some("Bearer key"), br#"{"text": "x"}"#))
            .await
            .unwrap();
        assert_eq!(extraction.admission.remaining, Some(9));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_eleventh_request_is_rejected_before_normalization() {
        let (pipeline, extractor) = pipeline(Some("key"), ok_outcome());
        for _ in 0..10 {
            pipeline
                .run(request(Some("Bearer key"), br#"{"text": "x"}"#))
                .await
                .unwrap();
        }
        // An empty body would be a 400 if normalization ran.
        let err = pipeline
            .run(request(Some("Bearer key"), b""))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { .. }));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_empty_text_never_reaches_upstream() {
        let (pipeline, extractor) = pipeline(Some("key"), ok_outcome());
        let err = pipeline
            .run(request(Some("Bearer key"), br#"{"text": "  "}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NoTextProvided));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_secret_is_a_server_error() {
        let (pipeline, _) = pipeline(None, ok_outcome());
        let response = pipeline
            .handle(request(Some("Bearer anything"), br#"{"text": "x"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_500() {
        let (pipeline, _) = pipeline(
            Some("key"),
            Err(ExtractionError::Upstream("OpenAI API error".to_string())),
        );
        let err = pipeline
            .run(request(Some("Bearer key"), br#"{"text": "x"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(ref m) if m == "OpenAI API error"));
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_quota() {
        let mut config = ServerConfig::default();
        config.auth.api_key = Some("key".to_string());
        config.rate_limit.requests = 2;
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
            outcome: ok_outcome(),
        });
        let pipeline = AdmissionPipeline::from_config(
            &config,
            Arc::new(SlidingWindowCounterStore::new()),
            extractor,
        )
        .unwrap();
        assert_eq!(pipeline.rate_limiter().description(), "2 per 1h");

        for _ in 0..2 {
            pipeline
                .run(request(Some("Bearer key"), br#"{"text": "x"}"#))
                .await
                .unwrap();
        }
        let err = pipeline
            .run(request(Some("Bearer key"), br#"{"text": "x"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { .. }));
    }

    #[test]
    fn test_from_config_rejects_bad_period() {
        let mut config = ServerConfig::default();
        config.rate_limit.period = "soon".to_string();
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
            outcome: ok_outcome(),
        });
        let result = AdmissionPipeline::from_config(
            &config,
            Arc::new(SlidingWindowCounterStore::new()),
            extractor,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_reads_headers_only() {
        let (pipeline, extractor) = pipeline(Some("key"), ok_outcome());

        let err = pipeline.authenticate(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::MissingHeader)));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        let err = pipeline.authenticate(&headers).unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::InvalidToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer key"));
        let credential = pipeline.authenticate(&headers).unwrap();
        let response = pipeline
            .handle_authenticated(&credential, InboundRequest::from_parts(&headers, b"fox"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        // The two rejected attempts consumed nothing.
        let extraction = pipeline
            .run(request(Some("Bearer key"), br#"{"text": "x"}"#))
            .await
            .unwrap();
        assert_eq!(extraction.admission.remaining, Some(8));
    }

    #[test]
    fn test_inbound_request_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer key"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let request = InboundRequest::from_parts(&headers, b"hello");
        assert_eq!(request.authorization.as_deref(), Some("Bearer key"));
        assert_eq!(request.content_type.as_deref(), Some("text/plain"));

        let empty = HeaderMap::new();
        assert!(InboundRequest::from_parts(&empty, b"").authorization.is_none());
    }
}
