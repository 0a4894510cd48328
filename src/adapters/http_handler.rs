use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    adapters::middleware::{
        request_id_middleware, request_timing_middleware, security_headers_middleware,
    },
    config::models::HttpServerConfig,
    core::{AdmissionPipeline, ApiError, InboundRequest},
};

/// HTTP surface of the keyword gateway.
#[derive(Clone)]
pub struct HttpHandler {
    pipeline: Arc<AdmissionPipeline>,
    server: HttpServerConfig,
}

impl HttpHandler {
    pub fn new(pipeline: Arc<AdmissionPipeline>, server: HttpServerConfig) -> Self {
        Self { pipeline, server }
    }

    /// Build the axum router with every route and cross-cutting layer.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/keywords", post(handle_keywords))
            .route("/health", get(handle_health_check))
            .fallback(handle_not_found)
            .method_not_allowed_fallback(handle_method_not_allowed)
            .layer(DefaultBodyLimit::max(self.server.max_body_bytes))
            .with_state(self.pipeline.clone())
            .layer(middleware::from_fn(request_timing_middleware))
            .layer(middleware::from_fn(request_id_middleware));

        if self.server.security_headers {
            router = router.layer(middleware::from_fn(security_headers_middleware));
        }

        router.layer(TraceLayer::new_for_http())
    }
}

/// Authentication runs on the headers before the body is buffered, so an
/// unauthenticated caller gets 401 whatever the size of its body.
async fn handle_keywords(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let credential = match pipeline.authenticate(&parts.headers) {
        Ok(credential) => credential,
        Err(err) => return err.into_response(),
    };

    // Reassembled so the `DefaultBodyLimit` extension still applies.
    let headers = parts.headers.clone();
    let body = match Bytes::from_request(Request::from_parts(parts, body), &()).await {
        Ok(body) => body,
        Err(rejection) => {
            return ApiError::BodyRejected {
                status: rejection.status(),
                message: rejection.body_text(),
            }
            .into_response();
        }
    };

    pipeline
        .handle_authenticated(&credential, InboundRequest::from_parts(&headers, &body))
        .await
}

async fn handle_health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn handle_not_found() -> ApiError {
    ApiError::NotFound
}

async fn handle_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
