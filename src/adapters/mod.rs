pub mod gcra_store;
pub mod http_handler;
pub mod middleware;
pub mod openai_extractor;
pub mod sliding_window_store;

use std::sync::Arc;

/// Re-export commonly used types from adapters
pub use gcra_store::GcraCounterStore;
pub use http_handler::HttpHandler;
pub use middleware::*;
pub use openai_extractor::OpenAiExtractor;
pub use sliding_window_store::SlidingWindowCounterStore;

use crate::{config::RateLimitAlgorithm, ports::CounterStore};

/// Counter store implementing the configured admission algorithm.
pub fn counter_store_for(algorithm: RateLimitAlgorithm) -> Arc<dyn CounterStore> {
    match algorithm {
        RateLimitAlgorithm::SlidingWindow => Arc::new(SlidingWindowCounterStore::new()),
        RateLimitAlgorithm::Gcra => Arc::new(GcraCounterStore::new()),
    }
}
