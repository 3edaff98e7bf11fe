use super::boost;
use super::{Result, SearchError};
use crate::cache::TtlCache;
use crate::config::SearchConfig;
use crate::models::{
    PreferenceProfile, QuerySource, ScoredResult, SearchMetrics, SearchResponse, SimilarArticle,
    TrendingTopic,
};
use crate::services::query::PreferenceQueryBuilder;
use crate::stores::{SearchFilters, VectorHit, VectorIndex};
use crate::utils::{exponential_decay, run_with_timeout};
use chrono::{Duration, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Preference-aware retrieval over the vector index.
///
/// `search_by_preferences` runs a two-stage state machine: the primary
/// preference-derived query, then exactly one fallback pass if the primary
/// pass comes back empty. There is no retry beyond the fallback; an empty
/// result after it is a legitimate terminal outcome.
pub struct SemanticSearchEngine {
    index: Arc<dyn VectorIndex>,
    queries: PreferenceQueryBuilder,
    config: SearchConfig,
    trending_cache: TtlCache<String, Vec<TrendingTopic>>,
}

impl SemanticSearchEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        queries: PreferenceQueryBuilder,
        config: SearchConfig,
    ) -> Self {
        let trending_cache = TtlCache::new(
            std::time::Duration::from_secs(config.trending_ttl_secs),
            config.trending_cache_capacity,
        );
        Self {
            index,
            queries,
            config,
            trending_cache,
        }
    }

    pub async fn search_by_preferences(
        &self,
        preferences: &PreferenceProfile,
        additional_filters: Option<SearchFilters>,
    ) -> Result<SearchResponse> {
        let started = Instant::now();

        let mut query = self.queries.convert(preferences).await?;
        let mut filters =
            self.build_filters(preferences, additional_filters.as_ref(), query.source);

        let mut hits = self.search_index(&query.embedding, &filters).await?;

        // The fallback is issued only after the primary pass is observed
        // empty, never speculatively.
        if hits.is_empty() && query.source == QuerySource::Primary {
            debug!(
                user_id = %preferences.user_id,
                "Primary query returned nothing, retrying with fallback"
            );
            query = self.queries.fallback().await?;
            filters.sources = None;
            hits = self.search_index(&query.embedding, &filters).await?;
        }

        let now = Utc::now();
        let candidates_considered = hits.len();
        let mut results: Vec<ScoredResult> = hits
            .into_iter()
            .map(|hit| boost::score_chunk(hit.chunk, hit.relevance, preferences, &self.config, now))
            .collect();
        results.sort_by(compare_results);
        results.truncate(self.config.max_results);

        let metrics = SearchMetrics {
            query_source: query.source,
            fallback_used: query.source == QuerySource::Fallback,
            candidates_considered,
            returned: results.len(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            user_id = %preferences.user_id,
            returned = metrics.returned,
            fallback_used = metrics.fallback_used,
            "Preference search complete"
        );
        Ok(SearchResponse { results, metrics })
    }

    /// Retrieve articles similar to a reference article via its own chunk
    /// embedding. The reference article never appears in the output; an
    /// unknown article yields an empty result, not an error.
    pub async fn find_similar_articles(
        &self,
        article_id: Uuid,
        limit: usize,
        exclude_categories: &[String],
    ) -> Result<Vec<SimilarArticle>> {
        let chunks = run_with_timeout(
            self.config.index_timeout_ms,
            self.index.chunks_for_article(article_id),
        )
        .await
        .map_err(|waited_ms| SearchError::Timeout {
            operation: "chunks_for_article",
            waited_ms,
        })?
        .map_err(|source| SearchError::Index {
            operation: "chunks_for_article",
            source,
        })?;

        let Some(reference) = chunks.iter().min_by_key(|c| c.metadata.chunk_index) else {
            debug!(article_id = %article_id, "Reference article has no chunks");
            return Ok(Vec::new());
        };

        let filters = SearchFilters {
            min_relevance: Some(self.config.min_relevance),
            ..Default::default()
        };
        let hits = self
            .search_index_with(
                &reference.embedding,
                &filters,
                limit + self.config.similar_headroom,
            )
            .await?;

        let excluded: HashSet<String> =
            exclude_categories.iter().map(|c| c.to_lowercase()).collect();
        let mut seen_articles = HashSet::new();
        let mut similar = Vec::new();
        for hit in hits {
            if hit.chunk.article_id == article_id {
                continue;
            }
            if let Some(category) = &hit.chunk.metadata.category {
                if excluded.contains(&category.to_lowercase()) {
                    continue;
                }
            }
            // Best chunk per article only
            if !seen_articles.insert(hit.chunk.article_id) {
                continue;
            }
            similar.push(SimilarArticle {
                chunk: hit.chunk,
                relevance: hit.relevance,
            });
            if similar.len() == limit {
                break;
            }
        }
        Ok(similar)
    }

    /// Category frequency among chunks published inside the trailing window,
    /// weighted by freshness so equal counts with fresher timestamps score
    /// higher. Read-through cached per (window, limit).
    pub async fn get_trending_topics(
        &self,
        window_hours: i64,
        limit: usize,
    ) -> Result<Vec<TrendingTopic>> {
        let cache_key = format!("trending:{window_hours}:{limit}");
        if let Some(cached) = self.trending_cache.get(&cache_key) {
            debug!(window_hours, "Trending cache hit");
            return Ok(cached);
        }

        let now = Utc::now();
        let cutoff = now - Duration::hours(window_hours);
        let chunks = run_with_timeout(
            self.config.index_timeout_ms,
            self.index.chunks_published_since(cutoff),
        )
        .await
        .map_err(|waited_ms| SearchError::Timeout {
            operation: "chunks_published_since",
            waited_ms,
        })?
        .map_err(|source| SearchError::Index {
            operation: "chunks_published_since",
            source,
        })?;

        struct TopicAgg {
            score: f32,
            articles: HashSet<Uuid>,
        }

        let half_life = (window_hours as f32 / 2.0).max(1.0);
        let mut topics: BTreeMap<String, TopicAgg> = BTreeMap::new();
        for chunk in chunks {
            let Some(category) = &chunk.metadata.category else {
                continue;
            };
            let Some(published_at) = chunk.metadata.published_at else {
                continue;
            };
            let age_hours = ((now - published_at).num_minutes() as f32 / 60.0).max(0.0);
            let agg = topics
                .entry(category.to_lowercase())
                .or_insert_with(|| TopicAgg {
                    score: 0.0,
                    articles: HashSet::new(),
                });
            agg.score += exponential_decay(age_hours, half_life);
            agg.articles.insert(chunk.article_id);
        }

        let mut trending: Vec<TrendingTopic> = topics
            .into_iter()
            .map(|(topic, agg)| TrendingTopic {
                topic,
                score: agg.score,
                article_count: agg.articles.len(),
            })
            .collect();
        trending.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.topic.cmp(&b.topic))
        });
        trending.truncate(limit);

        self.trending_cache.insert(cache_key, trending.clone());
        Ok(trending)
    }

    fn build_filters(
        &self,
        preferences: &PreferenceProfile,
        additional: Option<&SearchFilters>,
        source: QuerySource,
    ) -> SearchFilters {
        // A fallback first pass (degenerate profile) never restricts by
        // preferred source.
        let sources = match source {
            QuerySource::Primary if !preferences.preferred_sources.is_empty() => {
                Some(preferences.preferred_sources.clone())
            }
            _ => None,
        };
        let mut filters = SearchFilters {
            min_relevance: Some(self.config.min_relevance),
            sources,
            categories: None,
            date_range: None,
        };
        if let Some(additional) = additional {
            if let Some(min_relevance) = additional.min_relevance {
                filters.min_relevance = Some(min_relevance);
            }
            if let Some(sources) = &additional.sources {
                filters.sources = Some(sources.clone());
            }
            if let Some(categories) = &additional.categories {
                filters.categories = Some(categories.clone());
            }
            if let Some(date_range) = additional.date_range {
                filters.date_range = Some(date_range);
            }
        }
        filters
    }

    async fn search_index(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
    ) -> Result<Vec<VectorHit>> {
        self.search_index_with(embedding, filters, self.config.max_candidates)
            .await
    }

    async fn search_index_with(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        run_with_timeout(
            self.config.index_timeout_ms,
            self.index.search(embedding, filters, limit),
        )
        .await
        .map_err(|waited_ms| SearchError::Timeout {
            operation: "index_search",
            waited_ms,
        })?
        .map_err(|source| SearchError::Index {
            operation: "index_search",
            source,
        })
    }
}

/// Deterministic result ordering: final score descending, then newer
/// `published_at` first (absent dates last), then chunk id.
fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.final_score
        .partial_cmp(&a.final_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.chunk
                .metadata
                .published_at
                .cmp(&a.chunk.metadata.published_at)
        })
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}
