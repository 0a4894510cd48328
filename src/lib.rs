//! Keyword Gateway - an authenticated, rate-limited HTTP service that
//! extracts SEO keywords from text.
//!
//! A single business endpoint, `POST /keywords`, runs every request through
//! a fixed admission pipeline:
//!
//! 1. **Bearer authentication** against a server secret resolved from
//!    configuration or the environment.
//! 2. **Rate limiting**, 10 admissions per rolling hour by default, shared by
//!    every caller of the route.
//! 3. **Normalization** of JSON (`text` / `content`) or raw bodies into one
//!    non-empty text value.
//! 4. **Extraction** through a pluggable upstream capability (OpenAI
//!    Responses API by default).
//!
//! Every failure short-circuits the pipeline and is rendered as a JSON
//! envelope `{"error": ..., "message": ...}` with a fixed status code.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyword_gateway::{
//!     adapters::{HttpHandler, OpenAiExtractor, counter_store_for},
//!     config::ServerConfig,
//!     core::AdmissionPipeline,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg: ServerConfig = keyword_gateway::config::load_config(Some("config.toml")).await?;
//! let store = counter_store_for(cfg.rate_limit.algorithm);
//! let extractor = Arc::new(OpenAiExtractor::new(cfg.upstream.clone())?);
//! let pipeline = Arc::new(AdmissionPipeline::from_config(&cfg, store, extractor)?);
//! let app = HttpHandler::new(pipeline, cfg.server.clone()).router();
//! let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping the admission logic inside `core`. The counter store and the
//! keyword extractor are ports, so tests swap in deterministic fakes.
//!
//! # Error Handling
//! Request-path failures are `thiserror` enums funnelled into
//! [`core::ApiError`], the single mapping to status and JSON body. Startup
//! and configuration code returns `eyre::Result` with context attached.
//!
//! # Concurrency & Data Structures
//! Per-key rate limit state lives in `scc::HashMap`; holding an entry locks
//! its bucket, which makes increment-and-check atomic across tasks.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpHandler, OpenAiExtractor},
    core::{AdmissionPipeline, ApiError},
    utils::GracefulShutdown,
};
