//! Preference-aware score boosting.
//!
//! Every boost is multiplicative on top of the base vector relevance and
//! neutral (exactly 1.0) when the chunk lacks the metadata it keys on.

use crate::config::SearchConfig;
use crate::models::{PreferenceProfile, ScoredResult, TextChunk};
use crate::utils::exponential_decay;
use chrono::{DateTime, Utc};

/// Score one candidate chunk against the profile.
///
/// `final_score = base_relevance × category_boost × source_boost ×
/// recency_boost`, with each matched preference recorded as
/// `"category:<name>"` / `"source:<name>"`.
pub fn score_chunk(
    chunk: TextChunk,
    base_relevance: f32,
    preferences: &PreferenceProfile,
    config: &SearchConfig,
    now: DateTime<Utc>,
) -> ScoredResult {
    let mut matched_preferences = Vec::new();

    let category_boost = match &chunk.metadata.category {
        Some(category) => {
            let lowered = category.to_lowercase();
            if preferences
                .topics
                .iter()
                .any(|topic| topic.to_lowercase() == lowered)
            {
                matched_preferences.push(format!("category:{lowered}"));
                config.category_boost
            } else {
                1.0
            }
        }
        None => 1.0,
    };

    let source_boost = match &chunk.metadata.source {
        Some(source) if preferences.preferred_sources.contains(source) => {
            matched_preferences.push(format!("source:{source}"));
            config.source_boost
        }
        _ => 1.0,
    };

    let recency_boost = recency_boost(&chunk, config, now);

    let final_score = base_relevance * category_boost * source_boost * recency_boost;
    ScoredResult {
        chunk,
        base_relevance,
        category_boost,
        source_boost,
        recency_boost,
        final_score,
        matched_preferences,
    }
}

/// Freshness reward decaying toward 1.0 with article age; never below 1.0
/// and exactly 1.0 for an absent publication date.
fn recency_boost(chunk: &TextChunk, config: &SearchConfig, now: DateTime<Utc>) -> f32 {
    match chunk.metadata.published_at {
        Some(published_at) => {
            let age_hours = ((now - published_at).num_minutes() as f32 / 60.0).max(0.0);
            1.0 + (config.recency_boost_max - 1.0)
                * exponential_decay(age_hours, config.recency_half_life_hours)
        }
        None => 1.0,
    }
}
