//! Failure taxonomy of the HTTP surface and its single mapping to
//! status code + JSON envelope.
//!
//! Every terminal outcome other than a successful extraction is expressed as
//! an [`ApiError`]. Bodies always carry an `error` label; most also carry a
//! `message`. Secrets never appear in either.
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    core::{
        auth::AuthError,
        rate_limiter::{RateLimitError, rate_limit_headers},
    },
    ports::{Admission, ExtractionError},
};

pub const NO_TEXT_PROVIDED: &str =
    "No text provided. Send raw text or JSON with 'text' or 'content'.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rate limit exceeded: {description}")]
    RateLimited {
        admission: Admission,
        description: String,
    },

    #[error("rate limiter unavailable: {0}")]
    RateLimiterUnavailable(String),

    #[error("no text provided")]
    NoTextProvided,

    #[error("extractor configuration error: {0}")]
    UpstreamConfiguration(String),

    #[error("keyword extraction failed: {0}")]
    Upstream(String),

    #[error("request body rejected: {message}")]
    BodyRejected { status: StatusCode, message: String },

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Exceeded {
                admission,
                description,
            } => ApiError::RateLimited {
                admission,
                description,
            },
            RateLimitError::Unavailable(message) => ApiError::RateLimiterUnavailable(message),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Configuration(message) => ApiError::UpstreamConfiguration(message),
            ExtractionError::Upstream(message) => ApiError::Upstream(message),
        }
    }
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::ServerMisconfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NoTextProvided => StatusCode::BAD_REQUEST,
            ApiError::RateLimiterUnavailable(_)
            | ApiError::UpstreamConfiguration(_)
            | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BodyRejected { status, .. } => *status,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, message) = match self {
            ApiError::Auth(AuthError::MissingHeader) => (
                "Authentication required",
                Some("Bearer token is required in Authorization header".to_string()),
            ),
            ApiError::Auth(AuthError::MalformedScheme) => (
                "Invalid authentication format",
                Some("Authorization header must start with 'Bearer '".to_string()),
            ),
            ApiError::Auth(AuthError::EmptyOrMultiPartToken | AuthError::InvalidToken) => {
                ("Invalid token", Some("Bearer token is invalid".to_string()))
            }
            ApiError::Auth(AuthError::ServerMisconfigured) => (
                "Server configuration error",
                Some("API key not configured on server".to_string()),
            ),
            ApiError::RateLimited { description, .. } => {
                ("Rate limit exceeded", Some(description.clone()))
            }
            ApiError::RateLimiterUnavailable(message) => {
                ("Rate limiter unavailable", Some(message.clone()))
            }
            ApiError::NoTextProvided => (NO_TEXT_PROVIDED, None),
            ApiError::UpstreamConfiguration(message) => {
                ("Configuration error", Some(message.clone()))
            }
            ApiError::Upstream(message) => ("Failed to extract keywords", Some(message.clone())),
            ApiError::BodyRejected { message, .. } => {
                ("Invalid request body", Some(message.clone()))
            }
            ApiError::NotFound => ("Not found", None),
            ApiError::MethodNotAllowed => ("Method not allowed", None),
        };
        ErrorBody { error, message }
    }

    /// Environment problems are worth an operator's attention; caller
    /// mistakes are not.
    pub fn is_operator_fault(&self) -> bool {
        matches!(
            self,
            ApiError::Auth(AuthError::ServerMisconfigured)
                | ApiError::RateLimiterUnavailable(_)
                | ApiError::UpstreamConfiguration(_)
                | ApiError::Upstream(_)
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_operator_fault() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let mut response = (self.status_code(), Json(self.body())).into_response();

        match &self {
            ApiError::Auth(err) if *err != AuthError::ServerMisconfigured => {
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ApiError::RateLimited { admission, .. } => {
                response.headers_mut().extend(rate_limit_headers(admission));
            }
            _ => {}
        }

        response
    }
}
