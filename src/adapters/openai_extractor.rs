//! Keyword extraction through the OpenAI Responses API.
//!
//! The model is asked for structured output matching a strict JSON schema
//! (`{"keywords": [string]}`); the first `output_text` part of the reply is
//! decoded into an [`ExtractionResult`]. Every failure other than a missing
//! credential is reported as [`ExtractionError::Upstream`]. One attempt per
//! call, no retries.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    config::{models::UpstreamConfig, resolve_secret},
    ports::{ExtractionError, ExtractionOutcome, ExtractionResult, KeywordExtractor},
};

const SCHEMA_NAME: &str = "KeywordArray";

pub struct OpenAiExtractor {
    client: Client,
    config: UpstreamConfig,
}

impl OpenAiExtractor {
    pub fn new(config: UpstreamConfig) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("keyword-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| eyre::eyre!("Failed to build upstream HTTP client: {e}"))?;

        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Created OpenAI keyword extractor"
        );
        Ok(Self { client, config })
    }

    /// Resolved on every call so a key exported after startup is picked up.
    fn api_key(&self) -> Result<String, ExtractionError> {
        resolve_secret(self.config.api_key.as_deref(), &self.config.env_var).ok_or_else(|| {
            ExtractionError::Configuration(format!(
                "{} environment variable is required",
                self.config.env_var
            ))
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "model": self.config.model,
            "input": [
                { "role": "system", "content": self.config.system_prompt },
                { "role": "user", "content": text },
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": SCHEMA_NAME,
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": {
                            "keywords": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["keywords"],
                        "additionalProperties": false
                    }
                }
            }
        })
    }
}

#[async_trait]
impl KeywordExtractor for OpenAiExtractor {
    async fn extract(&self, text: &str) -> ExtractionOutcome {
        let api_key = self.api_key()?;

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| ExtractionError::Upstream(format!("Request to provider failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Upstream(format!("Failed to read provider response: {e}")))?;

        if !status.is_success() {
            return Err(ExtractionError::Upstream(error_message(status, &body)));
        }

        parse_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesPayload {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

/// Decode a successful Responses API body into keywords.
fn parse_response(body: &str) -> ExtractionOutcome {
    let payload: ResponsesPayload = serde_json::from_str(body)
        .map_err(|e| ExtractionError::Upstream(format!("Malformed provider response: {e}")))?;

    if let Some(error) = payload.error {
        return Err(ExtractionError::Upstream(error.message));
    }

    let parts = payload
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter());

    for part in parts {
        match (part.kind.as_str(), &part.text, &part.refusal) {
            ("output_text", Some(text), _) => {
                return serde_json::from_str::<ExtractionResult>(text).map_err(|e| {
                    ExtractionError::Upstream(format!("Provider output did not match schema: {e}"))
                });
            }
            ("refusal", _, Some(refusal)) => {
                return Err(ExtractionError::Upstream(format!(
                    "Provider refused the request: {refusal}"
                )));
            }
            _ => {}
        }
    }

    Err(ExtractionError::Upstream(
        "Provider response contained no output text".to_string(),
    ))
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("Error code: {} - {}", status.as_u16(), envelope.error.message),
        Err(_) => format!("Error code: {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{Json, Router, http::HeaderMap, routing::post};

    use super::*;

    fn sample_response(output_text: &str) -> Value {
        json!({
            "id": "resp_123",
            "object": "response",
            "status": "completed",
            "output": [
                { "type": "reasoning", "id": "rs_1", "summary": [] },
                {
                    "type": "message",
                    "id": "msg_1",
                    "role": "assistant",
                    "content": [
                        { "type": "output_text", "text": output_text, "annotations": [] }
                    ]
                }
            ]
        })
    }

    async fn spawn_provider(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn config_for(addr: SocketAddr, api_key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            api_key: api_key.map(str::to_string),
            env_var: "KEYWORD_GATEWAY_TEST_UNSET_OPENAI_KEY".to_string(),
            base_url: format!("http://{addr}/v1"),
            timeout_secs: 5,
            ..UpstreamConfig::default()
        }
    }

    #[test]
    fn test_parse_response_extracts_keywords() {
        let body = sample_response(r#"{"keywords":["fox","quick"]}"#).to_string();
        let result = parse_response(&body).unwrap();
        assert_eq!(result.keywords, vec!["fox", "quick"]);
    }

    #[test]
    fn test_parse_response_rejects_off_schema_output() {
        let body = sample_response(r#"{"words":["fox"]}"#).to_string();
        assert!(matches!(parse_response(&body), Err(ExtractionError::Upstream(_))));
        assert!(matches!(parse_response("<html>"), Err(ExtractionError::Upstream(_))));
        assert!(matches!(
            parse_response(r#"{"output": []}"#),
            Err(ExtractionError::Upstream(_))
        ));
    }

    #[test]
    fn test_parse_response_surfaces_refusal() {
        let body = json!({
            "output": [{
                "type": "message",
                "content": [{ "type": "refusal", "refusal": "I can't help with that." }]
            }]
        })
        .to_string();
        let err = parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("I can't help with that."));
    }

    #[test]
    fn test_error_message_prefers_provider_text() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, body),
            "Error code: 401 - Incorrect API key provided"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "oops"), "Error code: 502");
    }

    #[tokio::test]
    async fn test_missing_credential_is_a_configuration_error() {
        let extractor = OpenAiExtractor::new(UpstreamConfig {
            api_key: None,
            env_var: "KEYWORD_GATEWAY_TEST_UNSET_OPENAI_KEY".to_string(),
            ..UpstreamConfig::default()
        })
        .unwrap();
        let err = extractor.extract("some text").await.unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Configuration(
                "KEYWORD_GATEWAY_TEST_UNSET_OPENAI_KEY environment variable is required"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_extract_against_local_provider() {
        let router = Router::new().route(
            "/v1/responses",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer test-key");
                assert_eq!(body["model"], "gpt-5-nano");
                assert_eq!(body["input"][1]["content"], "The quick brown fox");
                assert_eq!(body["text"]["format"]["name"], SCHEMA_NAME);
                Json(sample_response(r#"{"keywords":["fox","quick"]}"#))
            }),
        );
        let addr = spawn_provider(router).await;

        let extractor = OpenAiExtractor::new(config_for(addr, Some("test-key"))).unwrap();
        let result = extractor.extract("The quick brown fox").await.unwrap();
        assert_eq!(result.keywords, vec!["fox", "quick"]);
    }

    #[tokio::test]
    async fn test_provider_error_status_is_upstream_failure() {
        let router = Router::new().route(
            "/v1/responses",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": { "message": "Rate limit reached" } })),
                )
            }),
        );
        let addr = spawn_provider(router).await;

        let extractor = OpenAiExtractor::new(config_for(addr, Some("test-key"))).unwrap();
        let err = extractor.extract("text").await.unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Upstream("Error code: 429 - Rate limit reached".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let extractor = OpenAiExtractor::new(config_for(addr, Some("test-key"))).unwrap();
        let err = extractor.extract("text").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Upstream(_)));
    }
}
