//! Preference-to-query conversion: turns a profile into a weighted textual
//! query plus its embedding, with a generic fallback query for degenerate
//! profiles and empty retrievals.

use crate::cache::TtlCache;
use crate::config::QueryConfig;
use crate::models::{PreferenceProfile, PreferenceQuery, QuerySource, WeightedTopic};
use crate::stores::Embedder;
use crate::utils::run_with_timeout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Query text used when a preference-derived query cannot be built or
/// returns nothing; keeps narrow or newly-created profiles from seeing an
/// empty feed.
pub const FALLBACK_QUERY_TEXT: &str = "general news current events";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Builds retrieval queries from preference profiles, read-through caching
/// embeddings by query text.
pub struct PreferenceQueryBuilder {
    embedder: Arc<dyn Embedder>,
    config: QueryConfig,
    embedding_cache: TtlCache<String, Vec<f32>>,
}

impl PreferenceQueryBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, config: QueryConfig) -> Self {
        let embedding_cache = TtlCache::new(
            Duration::from_secs(config.embedding_cache_ttl_secs),
            config.embedding_cache_capacity,
        );
        Self {
            embedder,
            config,
            embedding_cache,
        }
    }

    /// Build the weighted query for a profile. A profile with no topics has
    /// nothing to derive a query from and goes straight to the fallback.
    pub async fn convert(&self, preferences: &PreferenceProfile) -> Result<PreferenceQuery> {
        if preferences.topics.is_empty() {
            return self.fallback().await;
        }

        let started = Instant::now();
        let weighted_topics: Vec<WeightedTopic> = preferences
            .topics
            .iter()
            .map(|topic| WeightedTopic {
                topic: topic.clone(),
                weight: self.config.topic_weight,
            })
            .collect();
        let text = preferences
            .topics
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let embedding = self.embed_cached(&text).await?;
        debug!(
            user_id = %preferences.user_id,
            topic_count = weighted_topics.len(),
            "Built preference query"
        );

        Ok(PreferenceQuery {
            text,
            embedding,
            weighted_topics,
            source: QuerySource::Primary,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// The generic preference-independent query.
    pub async fn fallback(&self) -> Result<PreferenceQuery> {
        let started = Instant::now();
        let embedding = self.embed_cached(FALLBACK_QUERY_TEXT).await?;
        Ok(PreferenceQuery {
            text: FALLBACK_QUERY_TEXT.to_string(),
            embedding,
            weighted_topics: Vec::new(),
            source: QuerySource::Fallback,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn embed_cached(&self, text: &str) -> Result<Vec<f32>> {
        let key = text.to_string();
        if let Some(embedding) = self.embedding_cache.get(&key) {
            debug!(text_len = text.len(), "Embedding cache hit");
            return Ok(embedding);
        }

        let embedding = run_with_timeout(self.config.embed_timeout_ms, self.embedder.embed(text))
            .await
            .map_err(|waited_ms| ConversionError::Timeout { waited_ms })?
            .map_err(|e| ConversionError::Embedding(e.to_string()))?;

        self.embedding_cache.insert(key, embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::StoreError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, StoreError> {
            Err(StoreError::Backend("model unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_convert_joins_topics_in_set_order() {
        let embedder = CountingEmbedder::new();
        let builder = PreferenceQueryBuilder::new(embedder, QueryConfig::default());
        let profile = PreferenceProfile::default_for(Uuid::new_v4())
            .with_topic("technology")
            .with_topic("climate");

        let query = builder.convert(&profile).await.unwrap();
        assert_eq!(query.text, "climate technology");
        assert_eq!(query.source, QuerySource::Primary);
        assert_eq!(query.weighted_topics.len(), 2);
        assert!(query
            .weighted_topics
            .iter()
            .all(|w| (w.weight - 1.0).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_topicless_profile_uses_fallback() {
        let embedder = CountingEmbedder::new();
        let builder = PreferenceQueryBuilder::new(embedder, QueryConfig::default());
        let profile = PreferenceProfile::default_for(Uuid::new_v4());

        let query = builder.convert(&profile).await.unwrap();
        assert_eq!(query.source, QuerySource::Fallback);
        assert_eq!(query.text, FALLBACK_QUERY_TEXT);
        assert!(query.weighted_topics.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_cache_skips_repeat_calls() {
        let embedder = CountingEmbedder::new();
        let builder = PreferenceQueryBuilder::new(embedder.clone(), QueryConfig::default());
        let profile = PreferenceProfile::default_for(Uuid::new_v4()).with_topic("technology");

        builder.convert(&profile).await.unwrap();
        builder.convert(&profile).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_typed() {
        let builder = PreferenceQueryBuilder::new(Arc::new(FailingEmbedder), QueryConfig::default());
        let profile = PreferenceProfile::default_for(Uuid::new_v4()).with_topic("technology");

        let err = builder.convert(&profile).await.unwrap_err();
        assert!(matches!(err, ConversionError::Embedding(_)));
    }
}
