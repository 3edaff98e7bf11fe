use super::affinity;
use super::{LearningError, Result};
use crate::config::LearningConfig;
use crate::models::{
    AffinityStat, Interaction, InteractionAction, InteractionStats, LearningInsights,
    PreferenceChange, PreferenceField, PreferenceProfile,
};
use crate::stores::{InteractionStore, PreferenceStore, StoreError};
use crate::utils::run_with_timeout;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Learns a user's affinities from the interaction log and proposes
/// preference updates once enough evidence has accumulated.
///
/// Holds the preference store for reads only; committing proposed changes is
/// the caller's decision.
pub struct InteractionLearner {
    interactions: Arc<dyn InteractionStore>,
    preferences: Arc<dyn PreferenceStore>,
    config: LearningConfig,
}

/// Full-window analysis state shared by the insight and update paths.
struct Analysis {
    total: usize,
    confidence: f64,
    category_stats: Vec<AffinityStat>,
    source_stats: Vec<AffinityStat>,
    emerging_topics: Vec<String>,
    declining_sources: Vec<String>,
    profile: PreferenceProfile,
}

impl InteractionLearner {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: LearningConfig,
    ) -> Self {
        Self {
            interactions,
            preferences,
            config,
        }
    }

    /// Append an interaction to the log, then prune rows beyond the stored
    /// cap. Prune failures are logged and swallowed; the insert already
    /// succeeded.
    pub async fn track_interaction(&self, interaction: &Interaction) -> Result<()> {
        let user_id = interaction.user_id;
        self.store_call(
            "insert_interaction",
            user_id,
            self.interactions.insert(interaction),
        )
        .await?;
        debug!(
            user_id = %user_id,
            action = interaction.action.as_str(),
            "Recorded interaction"
        );

        self.prune_excess(user_id).await;
        Ok(())
    }

    /// Aggregate the user's recent history into affinities, trends, and
    /// proposed preference updates.
    ///
    /// Below `min_interactions_for_learning` the confidence is 0 and every
    /// derived list is empty.
    pub async fn analyze_interactions(&self, user_id: Uuid) -> Result<LearningInsights> {
        let analysis = self.run_analysis(user_id).await?;
        let (_, recommended_updates) = self.propose_updates(&analysis.profile, &analysis);

        let mut top_categories = analysis.category_stats;
        top_categories.truncate(self.config.max_top_items);
        let mut top_sources = analysis.source_stats;
        top_sources.truncate(self.config.max_top_items);

        info!(
            user_id = %user_id,
            total = analysis.total,
            confidence = analysis.confidence,
            "Interaction analysis complete"
        );

        Ok(LearningInsights {
            user_id,
            total_interactions: analysis.total as u32,
            learning_confidence: analysis.confidence,
            top_categories,
            top_sources,
            emerging_topics: analysis.emerging_topics,
            declining_sources: analysis.declining_sources,
            recommended_updates,
            last_analyzed: Utc::now(),
        })
    }

    /// Propose per-field changes to `current` based on fresh analysis.
    ///
    /// Below the commit threshold this is a no-op: the input profile comes
    /// back unchanged with an empty change list. The preference store is
    /// never written here.
    pub async fn update_preferences_from_interactions(
        &self,
        user_id: Uuid,
        current: &PreferenceProfile,
    ) -> Result<(PreferenceProfile, Vec<PreferenceChange>)> {
        let analysis = self.run_analysis(user_id).await?;
        if analysis.confidence < self.config.commit_confidence_threshold {
            debug!(
                user_id = %user_id,
                confidence = analysis.confidence,
                "Confidence below commit threshold, leaving preferences untouched"
            );
            return Ok((current.clone(), Vec::new()));
        }

        let (updated, changes) = self.propose_updates(current, &analysis);
        info!(
            user_id = %user_id,
            change_count = changes.len(),
            confidence = analysis.confidence,
            "Proposed preference updates"
        );
        Ok((updated, changes))
    }

    /// Lightweight display summary: counts by action, trailing-day activity,
    /// and a two-bucket trend. Not gated on learning confidence.
    pub async fn get_user_interaction_stats(&self, user_id: Uuid) -> Result<InteractionStats> {
        let rows = self
            .store_call(
                "query_stats",
                user_id,
                self.interactions
                    .query(user_id, self.config.stats_window, false),
            )
            .await?;

        let now = Utc::now();
        let day_ago = now - Duration::hours(24);
        let two_days_ago = now - Duration::hours(48);

        let mut by_action: BTreeMap<InteractionAction, u32> = BTreeMap::new();
        let mut recent = 0u32;
        let mut previous = 0u32;
        for row in &rows {
            *by_action.entry(row.action).or_default() += 1;
            if row.timestamp >= day_ago {
                recent += 1;
            } else if row.timestamp >= two_days_ago {
                previous += 1;
            }
        }

        Ok(InteractionStats {
            user_id,
            total_interactions: rows.len() as u32,
            by_action,
            recent_activity: recent,
            trend: affinity::trend_from_counts(recent, previous, recent + previous),
        })
    }

    /// Delete the user's interaction history. Irreversible.
    pub async fn reset_user_learning(&self, user_id: Uuid) -> Result<()> {
        self.store_call("delete_all", user_id, self.interactions.delete_all(user_id))
            .await?;
        info!(user_id = %user_id, "Interaction history reset");
        Ok(())
    }

    async fn run_analysis(&self, user_id: Uuid) -> Result<Analysis> {
        let timeout_ms = self.config.store_timeout_ms;
        let window = self.config.analysis_window;

        let interactions_fut = async {
            run_with_timeout(timeout_ms, self.interactions.query(user_id, window, true))
                .await
                .map_err(|waited_ms| LearningError::Timeout {
                    operation: "query_interactions",
                    user_id,
                    waited_ms,
                })?
                .map_err(|source| LearningError::Store {
                    operation: "query_interactions",
                    user_id,
                    source,
                })
        };
        let profile_fut = async {
            run_with_timeout(timeout_ms, self.preferences.get(user_id))
                .await
                .map_err(|waited_ms| LearningError::Timeout {
                    operation: "load_profile",
                    user_id,
                    waited_ms,
                })?
                .map_err(|source| LearningError::Store {
                    operation: "load_profile",
                    user_id,
                    source,
                })
        };
        // The two reads touch disjoint data; overlap them.
        let (interactions, profile) = tokio::try_join!(interactions_fut, profile_fut)?;
        let profile = profile.unwrap_or_else(|| PreferenceProfile::default_for(user_id));

        let total = interactions.len();
        let confidence = affinity::learning_confidence(total, &self.config);
        if confidence == 0.0 {
            debug!(
                user_id = %user_id,
                total,
                "Below learning minimum, skipping aggregation"
            );
            return Ok(Analysis {
                total,
                confidence,
                category_stats: Vec::new(),
                source_stats: Vec::new(),
                emerging_topics: Vec::new(),
                declining_sources: Vec::new(),
                profile,
            });
        }

        let mut category_stats =
            affinity::aggregate_affinities(&interactions, |i| i.metadata.category.as_deref());
        affinity::rank_affinities(&mut category_stats, self.config.significant_volume);

        let mut source_stats =
            affinity::aggregate_affinities(&interactions, |i| i.metadata.source.as_deref());
        affinity::rank_affinities(&mut source_stats, self.config.significant_volume);

        let emerging_topics = affinity::emerging_topics(
            &interactions,
            &profile.topics,
            self.config.emerging_window_hours,
        );
        let declining_sources = affinity::declining_sources(&source_stats);

        Ok(Analysis {
            total,
            confidence,
            category_stats,
            source_stats,
            emerging_topics,
            declining_sources,
            profile,
        })
    }

    /// Build per-field proposals against `current`. Each field is considered
    /// independently; fields with no qualifying signal are left untouched.
    fn propose_updates(
        &self,
        current: &PreferenceProfile,
        analysis: &Analysis,
    ) -> (PreferenceProfile, Vec<PreferenceChange>) {
        let mut updated = current.clone();
        let mut changes = Vec::new();

        if analysis.confidence < self.config.commit_confidence_threshold {
            return (updated, changes);
        }

        let new_topics: Vec<&String> = analysis
            .emerging_topics
            .iter()
            .filter(|t| !current.topics.contains(*t))
            .collect();
        if !new_topics.is_empty() {
            let old_value: Vec<String> = current.topics.iter().cloned().collect();
            for topic in new_topics {
                updated.topics.insert(topic.clone());
            }
            changes.push(PreferenceChange {
                field: PreferenceField::Topics,
                old_value,
                new_value: updated.topics.iter().cloned().collect(),
                reason: "added emerging topics".to_string(),
                confidence: analysis.confidence * 0.9,
            });
        }

        let preferred: Vec<&AffinityStat> = analysis
            .source_stats
            .iter()
            .filter(|s| {
                s.positive_ratio >= self.config.preferred_source_ratio
                    && s.total_interactions >= self.config.significant_volume
                    && !current.preferred_sources.contains(&s.item)
            })
            .collect();
        if !preferred.is_empty() {
            let old_value: Vec<String> = current.preferred_sources.iter().cloned().collect();
            let mean_ratio =
                preferred.iter().map(|s| s.positive_ratio).sum::<f64>() / preferred.len() as f64;
            for stat in &preferred {
                updated = updated.prefer_source(&stat.item);
            }
            changes.push(PreferenceChange {
                field: PreferenceField::PreferredSources,
                old_value,
                new_value: updated.preferred_sources.iter().cloned().collect(),
                reason: "positive source interactions".to_string(),
                confidence: analysis.confidence * mean_ratio,
            });
        }

        let excluded: Vec<&AffinityStat> = analysis
            .source_stats
            .iter()
            .filter(|s| {
                analysis.declining_sources.contains(&s.item)
                    && !current.excluded_sources.contains(&s.item)
            })
            .collect();
        if !excluded.is_empty() {
            let old_value: Vec<String> = current.excluded_sources.iter().cloned().collect();
            let mean_negative = excluded
                .iter()
                .map(|s| 1.0 - s.positive_ratio)
                .sum::<f64>()
                / excluded.len() as f64;
            for stat in &excluded {
                updated = updated.exclude_source(&stat.item);
            }
            changes.push(PreferenceChange {
                field: PreferenceField::ExcludedSources,
                old_value,
                new_value: updated.excluded_sources.iter().cloned().collect(),
                reason: "negative interactions".to_string(),
                confidence: analysis.confidence * mean_negative,
            });
        }

        (updated, changes)
    }

    async fn prune_excess(&self, user_id: Uuid) {
        let cap = self.config.max_stored_interactions.max(1);
        let rows = match self
            .store_call(
                "prune_query",
                user_id,
                self.interactions.query(user_id, cap + 1, false),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to check stored interaction cap");
                return;
            }
        };
        if rows.len() <= cap {
            return;
        }

        // Rows are newest first; everything older than the cap-th newest
        // timestamp goes.
        let cutoff = rows[cap - 1].timestamp;
        match self
            .store_call(
                "prune_delete",
                user_id,
                self.interactions.delete_older_than(user_id, cutoff),
            )
            .await
        {
            Ok(deleted) => {
                debug!(user_id = %user_id, deleted, "Pruned interactions beyond cap");
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to prune stored interactions");
            }
        }
    }

    async fn store_call<T, F>(
        &self,
        operation: &'static str,
        user_id: Uuid,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        run_with_timeout(self.config.store_timeout_ms, call)
            .await
            .map_err(|waited_ms| LearningError::Timeout {
                operation,
                user_id,
                waited_ms,
            })?
            .map_err(|source| LearningError::Store {
                operation,
                user_id,
                source,
            })
    }
}
