use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// A recorded user action on an article.
///
/// `read_more`, `like` and `share` count as positive engagement; `hide` is
/// the only negative signal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    ReadMore,
    Like,
    Hide,
    Share,
}

impl InteractionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::ReadMore => "read_more",
            InteractionAction::Like => "like",
            InteractionAction::Hide => "hide",
            InteractionAction::Share => "share",
        }
    }

    pub fn is_positive(&self) -> bool {
        !matches!(self, InteractionAction::Hide)
    }
}

/// Article metadata joined onto an interaction row at query time.
///
/// All fields are optional; absent metadata is neutral everywhere and never
/// an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub source: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One row of the append-only interaction log. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub action: InteractionAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ArticleMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Formal,
    Casual,
    Fun,
}

/// Per-user preference profile.
///
/// Sets are value types: every mutation produces a new profile, and the
/// preferred/excluded source sets stay mutually exclusive because all source
/// moves go through [`PreferenceProfile::prefer_source`] and
/// [`PreferenceProfile::exclude_source`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub user_id: Uuid,
    pub topics: BTreeSet<String>,
    pub tone: Tone,
    pub reading_time_minutes: u32,
    pub preferred_sources: BTreeSet<String>,
    pub excluded_sources: BTreeSet<String>,
    pub last_updated: DateTime<Utc>,
}

impl PreferenceProfile {
    /// Profile created on first access.
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            topics: BTreeSet::new(),
            tone: Tone::Casual,
            reading_time_minutes: 5,
            preferred_sources: BTreeSet::new(),
            excluded_sources: BTreeSet::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.insert(topic.into());
        self
    }

    /// Move a source to the preferred set, removing it from the excluded set.
    pub fn prefer_source(mut self, source: &str) -> Self {
        self.excluded_sources.remove(source);
        self.preferred_sources.insert(source.to_string());
        self
    }

    /// Move a source to the excluded set, removing it from the preferred set.
    pub fn exclude_source(mut self, source: &str) -> Self {
        self.preferred_sources.remove(source);
        self.excluded_sources.insert(source.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

/// Derived positive/negative engagement measure for a category or source.
/// Computed fresh per analysis call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinityStat {
    pub item: String,
    pub total_interactions: u32,
    pub positive_interactions: u32,
    pub negative_interactions: u32,
    pub positive_ratio: f64,
    pub last_interaction: DateTime<Utc>,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceField {
    Topics,
    PreferredSources,
    ExcludedSources,
}

impl PreferenceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceField::Topics => "topics",
            PreferenceField::PreferredSources => "preferred_sources",
            PreferenceField::ExcludedSources => "excluded_sources",
        }
    }
}

/// One proposed field-level profile change. The decision to commit belongs
/// to the caller; the learner never writes the preference store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceChange {
    pub field: PreferenceField,
    pub old_value: Vec<String>,
    pub new_value: Vec<String>,
    pub reason: String,
    pub confidence: f64,
}

/// Full analysis output of the interaction learner. Ephemeral and recomputed
/// on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningInsights {
    pub user_id: Uuid,
    pub total_interactions: u32,
    pub learning_confidence: f64,
    pub top_categories: Vec<AffinityStat>,
    pub top_sources: Vec<AffinityStat>,
    pub emerging_topics: Vec<String>,
    pub declining_sources: Vec<String>,
    pub recommended_updates: Vec<PreferenceChange>,
    pub last_analyzed: DateTime<Utc>,
}

/// Lightweight per-user summary for display surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionStats {
    pub user_id: Uuid,
    pub total_interactions: u32,
    pub by_action: BTreeMap<InteractionAction, u32>,
    pub recent_activity: u32,
    pub trend: Trend,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub chunk_index: u32,
    pub word_count: u32,
}

/// A unit of embedded article text stored in the vector index. Read-only to
/// this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: Uuid,
    pub article_id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A retrieved chunk with its boost breakdown.
///
/// `final_score = base_relevance × category_boost × source_boost ×
/// recency_boost`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    pub chunk: TextChunk,
    pub base_relevance: f32,
    pub category_boost: f32,
    pub source_boost: f32,
    pub recency_boost: f32,
    pub final_score: f32,
    pub matched_preferences: Vec<String>,
}

/// Which query produced a result set: the preference-derived query or the
/// generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedTopic {
    pub topic: String,
    pub weight: f32,
}

/// A preference profile converted to retrievable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceQuery {
    pub text: String,
    pub embedding: Vec<f32>,
    pub weighted_topics: Vec<WeightedTopic>,
    pub source: QuerySource,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetrics {
    pub query_source: QuerySource,
    pub fallback_used: bool,
    pub candidates_considered: usize,
    pub returned: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredResult>,
    pub metrics: SearchMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarArticle {
    pub chunk: TextChunk,
    pub relevance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingTopic {
    pub topic: String,
    pub score: f32,
    pub article_count: usize,
}
