//! Semantic search and ranking: preference-aware retrieval over the vector
//! index with multi-factor score boosting and a single fallback pass.

pub mod boost;
pub mod engine;

pub use engine::SemanticSearchEngine;

use crate::services::query::ConversionError;
use crate::stores::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("vector index {operation} failed: {source}")]
    Index {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("{operation} timed out after {waited_ms}ms")]
    Timeout {
        operation: &'static str,
        waited_ms: u64,
    },
}

pub type Result<T> = std::result::Result<T, SearchError>;
