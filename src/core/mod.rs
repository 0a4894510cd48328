pub mod auth;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod rate_limiter;

pub use auth::{AuthError, ServerSecret, TokenValidator};
pub use error::ApiError;
pub use pipeline::{AdmissionPipeline, InboundRequest, Stage};
pub use rate_limiter::RouteRateLimiter;
