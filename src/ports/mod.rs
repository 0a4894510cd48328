pub mod counter_store;
pub mod keyword_extractor;

pub use counter_store::{Admission, CounterStore, CounterStoreError, CounterStoreResult};
pub use keyword_extractor::{
    ExtractionError, ExtractionOutcome, ExtractionResult, KeywordExtractor,
};
