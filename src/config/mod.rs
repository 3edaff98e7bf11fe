use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    pub learning: LearningConfig,
    pub query: QueryConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    /// Stored-interaction cap per user; excess rows are pruned after insert.
    pub max_stored_interactions: usize,
    /// Newest interactions considered by analysis.
    pub analysis_window: usize,
    /// Below this count, learning confidence is 0 and nothing is derived.
    pub min_interactions_for_learning: usize,
    /// Scale of the confidence saturation curve.
    pub confidence_scale: f64,
    /// Interaction volume at which an affinity becomes significant.
    pub significant_volume: u32,
    /// Entries kept in top_categories / top_sources.
    pub max_top_items: usize,
    /// Trailing window for emerging-topic detection, anchored on the newest
    /// interaction.
    pub emerging_window_hours: i64,
    /// Confidence required before preference updates are proposed.
    pub commit_confidence_threshold: f64,
    /// Positive ratio required before a source is proposed as preferred.
    pub preferred_source_ratio: f64,
    /// Rows considered by the lightweight stats path.
    pub stats_window: usize,
    pub store_timeout_ms: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_stored_interactions: 1000,
            analysis_window: 100,
            min_interactions_for_learning: 5,
            confidence_scale: 15.0,
            significant_volume: 3,
            max_top_items: 5,
            emerging_window_hours: 48,
            commit_confidence_threshold: 0.3,
            preferred_source_ratio: 0.7,
            stats_window: 200,
            store_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Initial weight of each topic term in the query text.
    pub topic_weight: f32,
    pub embed_timeout_ms: u64,
    pub embedding_cache_ttl_secs: u64,
    pub embedding_cache_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            topic_weight: 1.0,
            embed_timeout_ms: 2_000,
            embedding_cache_ttl_secs: 300,
            embedding_cache_capacity: 1_024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Relevance floor passed to the vector index.
    pub min_relevance: f32,
    /// Candidates requested from the index before boosting.
    pub max_candidates: usize,
    /// Entries returned after sorting.
    pub max_results: usize,
    pub category_boost: f32,
    pub source_boost: f32,
    /// Ceiling of the recency boost; decays toward 1.0 with article age.
    pub recency_boost_max: f32,
    pub recency_half_life_hours: f32,
    /// Extra candidates fetched by find-similar to survive self-exclusion
    /// and per-article dedup.
    pub similar_headroom: usize,
    pub trending_ttl_secs: u64,
    pub trending_cache_capacity: usize,
    pub index_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_relevance: 0.3,
            max_candidates: 50,
            max_results: 15,
            category_boost: 1.3,
            source_boost: 1.2,
            recency_boost_max: 1.25,
            recency_half_life_hours: 48.0,
            similar_headroom: 10,
            trending_ttl_secs: 300,
            trending_cache_capacity: 64,
            index_timeout_ms: 2_000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        EngineConfig {
            learning: LearningConfig {
                max_stored_interactions: env::var("LEARNING_MAX_STORED_INTERACTIONS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .expect("LEARNING_MAX_STORED_INTERACTIONS must be a valid usize"),
                analysis_window: env::var("LEARNING_ANALYSIS_WINDOW")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .expect("LEARNING_ANALYSIS_WINDOW must be a valid usize"),
                min_interactions_for_learning: env::var("LEARNING_MIN_INTERACTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("LEARNING_MIN_INTERACTIONS must be a valid usize"),
                confidence_scale: env::var("LEARNING_CONFIDENCE_SCALE")
                    .unwrap_or_else(|_| "15.0".to_string())
                    .parse()
                    .expect("LEARNING_CONFIDENCE_SCALE must be a valid f64"),
                significant_volume: env::var("LEARNING_SIGNIFICANT_VOLUME")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .expect("LEARNING_SIGNIFICANT_VOLUME must be a valid u32"),
                max_top_items: env::var("LEARNING_MAX_TOP_ITEMS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("LEARNING_MAX_TOP_ITEMS must be a valid usize"),
                emerging_window_hours: env::var("LEARNING_EMERGING_WINDOW_HOURS")
                    .unwrap_or_else(|_| "48".to_string())
                    .parse()
                    .expect("LEARNING_EMERGING_WINDOW_HOURS must be a valid i64"),
                commit_confidence_threshold: env::var("LEARNING_COMMIT_CONFIDENCE")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("LEARNING_COMMIT_CONFIDENCE must be a valid f64"),
                preferred_source_ratio: env::var("LEARNING_PREFERRED_SOURCE_RATIO")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()
                    .expect("LEARNING_PREFERRED_SOURCE_RATIO must be a valid f64"),
                stats_window: env::var("LEARNING_STATS_WINDOW")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .expect("LEARNING_STATS_WINDOW must be a valid usize"),
                store_timeout_ms: env::var("LEARNING_STORE_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .expect("LEARNING_STORE_TIMEOUT_MS must be a valid u64"),
            },
            query: QueryConfig {
                topic_weight: env::var("QUERY_TOPIC_WEIGHT")
                    .unwrap_or_else(|_| "1.0".to_string())
                    .parse()
                    .expect("QUERY_TOPIC_WEIGHT must be a valid f32"),
                embed_timeout_ms: env::var("QUERY_EMBED_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .expect("QUERY_EMBED_TIMEOUT_MS must be a valid u64"),
                embedding_cache_ttl_secs: env::var("QUERY_EMBEDDING_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("QUERY_EMBEDDING_CACHE_TTL_SECS must be a valid u64"),
                embedding_cache_capacity: env::var("QUERY_EMBEDDING_CACHE_CAPACITY")
                    .unwrap_or_else(|_| "1024".to_string())
                    .parse()
                    .expect("QUERY_EMBEDDING_CACHE_CAPACITY must be a valid usize"),
            },
            search: SearchConfig {
                min_relevance: env::var("SEARCH_MIN_RELEVANCE")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("SEARCH_MIN_RELEVANCE must be a valid f32"),
                max_candidates: env::var("SEARCH_MAX_CANDIDATES")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .expect("SEARCH_MAX_CANDIDATES must be a valid usize"),
                max_results: env::var("SEARCH_MAX_RESULTS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .expect("SEARCH_MAX_RESULTS must be a valid usize"),
                category_boost: env::var("SEARCH_CATEGORY_BOOST")
                    .unwrap_or_else(|_| "1.3".to_string())
                    .parse()
                    .expect("SEARCH_CATEGORY_BOOST must be a valid f32"),
                source_boost: env::var("SEARCH_SOURCE_BOOST")
                    .unwrap_or_else(|_| "1.2".to_string())
                    .parse()
                    .expect("SEARCH_SOURCE_BOOST must be a valid f32"),
                recency_boost_max: env::var("SEARCH_RECENCY_BOOST_MAX")
                    .unwrap_or_else(|_| "1.25".to_string())
                    .parse()
                    .expect("SEARCH_RECENCY_BOOST_MAX must be a valid f32"),
                recency_half_life_hours: env::var("SEARCH_RECENCY_HALF_LIFE_HOURS")
                    .unwrap_or_else(|_| "48.0".to_string())
                    .parse()
                    .expect("SEARCH_RECENCY_HALF_LIFE_HOURS must be a valid f32"),
                similar_headroom: env::var("SEARCH_SIMILAR_HEADROOM")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("SEARCH_SIMILAR_HEADROOM must be a valid usize"),
                trending_ttl_secs: env::var("SEARCH_TRENDING_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("SEARCH_TRENDING_TTL_SECS must be a valid u64"),
                trending_cache_capacity: env::var("SEARCH_TRENDING_CACHE_CAPACITY")
                    .unwrap_or_else(|_| "64".to_string())
                    .parse()
                    .expect("SEARCH_TRENDING_CACHE_CAPACITY must be a valid usize"),
                index_timeout_ms: env::var("SEARCH_INDEX_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .expect("SEARCH_INDEX_TIMEOUT_MS must be a valid u64"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_env_fallbacks() {
        let defaults = EngineConfig::default();
        assert_eq!(defaults.learning.max_stored_interactions, 1000);
        assert_eq!(defaults.learning.min_interactions_for_learning, 5);
        assert_eq!(defaults.search.max_results, 15);
        assert!((defaults.search.category_boost - 1.3).abs() < f32::EPSILON);
    }
}
