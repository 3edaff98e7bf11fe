//! Collaborator seams: the durable stores, the embedding function, and the
//! vector index are external to this engine and live behind these traits.

pub mod memory;

use crate::models::{Interaction, PreferenceProfile, TextChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

pub use memory::{
    HashEmbedder, InMemoryInteractionStore, InMemoryPreferenceStore, InMemoryVectorIndex,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{operation} timed out after {waited_ms}ms")]
    Timeout { operation: String, waited_ms: u64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable append-only log of user interactions, queryable by user.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn insert(&self, interaction: &Interaction) -> Result<()>;

    /// Fetch up to `limit` interactions for a user, newest first. With
    /// `join_metadata = false` the article metadata fields come back empty.
    async fn query(
        &self,
        user_id: Uuid,
        limit: usize,
        join_metadata: bool,
    ) -> Result<Vec<Interaction>>;

    /// Delete interactions strictly older than `cutoff`. Returns the number
    /// of deleted rows.
    async fn delete_older_than(&self, user_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn delete_all(&self, user_id: Uuid) -> Result<()>;
}

/// Durable per-user preference profile, last-write-wins on update.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<PreferenceProfile>>;

    async fn create(&self, profile: &PreferenceProfile) -> Result<PreferenceProfile>;

    async fn update(&self, user_id: Uuid, profile: &PreferenceProfile)
        -> Result<PreferenceProfile>;
}

/// External embedding function.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Metadata filters for a nearest-neighbor query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub min_relevance: Option<f32>,
    pub sources: Option<BTreeSet<String>>,
    pub categories: Option<BTreeSet<String>>,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub chunk: TextChunk,
    pub relevance: f32,
}

/// Similarity index over embedded article chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest-neighbor search with optional metadata filters, best matches
    /// first.
    async fn search(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<VectorHit>>;

    /// Exact lookup of an article's own chunks.
    async fn chunks_for_article(&self, article_id: Uuid) -> Result<Vec<TextChunk>>;

    /// Chunks published at or after `cutoff`.
    async fn chunks_published_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TextChunk>>;
}
