//! Affinity aggregation: per-item engagement statistics, trend detection,
//! the two-key ranking, the confidence curve, and emerging-topic extraction.

use crate::config::LearningConfig;
use crate::models::{AffinityStat, Interaction, Trend};
use chrono::Duration;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Confidence in the interaction evidence, in [0, 1].
///
/// Zero below `min_interactions_for_learning`, then
/// `1 − exp(−(n − min + 1) / scale)`: monotonically increasing and
/// saturating toward 1 as the count passes several dozen (≈0.87 at 35
/// interactions with the default scale of 15).
pub fn learning_confidence(total: usize, config: &LearningConfig) -> f64 {
    if total < config.min_interactions_for_learning {
        return 0.0;
    }
    let evidence = (total - config.min_interactions_for_learning + 1) as f64;
    1.0 - (-evidence / config.confidence_scale).exp()
}

/// Compare recent-half and older-half counts with a volume-scaled margin of
/// `max(1, ceil(total × 0.2))`. Differences inside the margin are `Stable`.
pub fn trend_from_counts(recent: u32, older: u32, total: u32) -> Trend {
    let margin = ((total as f64) * 0.2).ceil().max(1.0) as i64;
    let diff = recent as i64 - older as i64;
    if diff >= margin {
        Trend::Increasing
    } else if diff <= -margin {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Aggregate per-item affinity statistics over the analysis window, keyed by
/// `extract` (category or source). Rows with absent metadata are skipped.
///
/// Each item's trend compares its interaction counts on either side of the
/// window midpoint (halfway between the oldest and newest timestamps).
pub fn aggregate_affinities<F>(interactions: &[Interaction], extract: F) -> Vec<AffinityStat>
where
    F: Fn(&Interaction) -> Option<&str>,
{
    let newest = match interactions.iter().map(|i| i.timestamp).max() {
        Some(t) => t,
        None => return Vec::new(),
    };
    let oldest = interactions
        .iter()
        .map(|i| i.timestamp)
        .min()
        .unwrap_or(newest);
    let midpoint = oldest + (newest - oldest) / 2;

    struct ItemAgg {
        total: u32,
        positive: u32,
        negative: u32,
        recent: u32,
        older: u32,
        last: chrono::DateTime<chrono::Utc>,
    }

    let mut items: BTreeMap<String, ItemAgg> = BTreeMap::new();
    for interaction in interactions {
        let Some(item) = extract(interaction) else {
            continue;
        };
        let agg = items.entry(item.to_string()).or_insert(ItemAgg {
            total: 0,
            positive: 0,
            negative: 0,
            recent: 0,
            older: 0,
            last: interaction.timestamp,
        });
        agg.total += 1;
        if interaction.action.is_positive() {
            agg.positive += 1;
        } else {
            agg.negative += 1;
        }
        if interaction.timestamp >= midpoint {
            agg.recent += 1;
        } else {
            agg.older += 1;
        }
        if interaction.timestamp > agg.last {
            agg.last = interaction.timestamp;
        }
    }

    items
        .into_iter()
        .map(|(item, agg)| AffinityStat {
            item,
            total_interactions: agg.total,
            positive_interactions: agg.positive,
            negative_interactions: agg.negative,
            positive_ratio: agg.positive as f64 / agg.total as f64,
            last_interaction: agg.last,
            trend: trend_from_counts(agg.recent, agg.older, agg.total),
        })
        .collect()
}

fn ratio_band(ratio: f64) -> u32 {
    (ratio * 10.0).floor().clamp(0.0, 10.0) as u32
}

/// Two-key affinity ordering.
///
/// Items with significant volume rank ahead of items below it; within a
/// significance class the keys are positive-ratio decile band, then volume,
/// then exact ratio, then item name. The banding keeps a slightly lower
/// ratio with much higher volume ahead of a one-off perfect ratio.
pub fn rank_affinities(stats: &mut [AffinityStat], significant_volume: u32) {
    stats.sort_by(|a, b| {
        let a_significant = a.total_interactions >= significant_volume;
        let b_significant = b.total_interactions >= significant_volume;
        b_significant
            .cmp(&a_significant)
            .then_with(|| ratio_band(b.positive_ratio).cmp(&ratio_band(a.positive_ratio)))
            .then_with(|| b.total_interactions.cmp(&a.total_interactions))
            .then_with(|| {
                b.positive_ratio
                    .partial_cmp(&a.positive_ratio)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.item.cmp(&b.item))
    });
}

/// Tags appearing disproportionately among recent positive interactions and
/// not yet present in the user's topics.
///
/// A tag qualifies when it occurs at least twice inside the trailing window
/// (anchored on the newest interaction) and that recent slice holds more
/// than half of its window-wide occurrences.
pub fn emerging_topics(
    interactions: &[Interaction],
    known_topics: &BTreeSet<String>,
    window_hours: i64,
) -> Vec<String> {
    let newest = match interactions.iter().map(|i| i.timestamp).max() {
        Some(t) => t,
        None => return Vec::new(),
    };
    let recent_cutoff = newest - Duration::hours(window_hours);

    let mut window_counts: BTreeMap<&str, u32> = BTreeMap::new();
    let mut recent_counts: BTreeMap<&str, u32> = BTreeMap::new();
    for interaction in interactions {
        if !interaction.action.is_positive() {
            continue;
        }
        for tag in &interaction.metadata.tags {
            *window_counts.entry(tag.as_str()).or_default() += 1;
            if interaction.timestamp >= recent_cutoff {
                *recent_counts.entry(tag.as_str()).or_default() += 1;
            }
        }
    }

    recent_counts
        .into_iter()
        .filter(|(tag, recent)| {
            *recent >= 2
                && *recent * 2 > window_counts.get(tag).copied().unwrap_or(0)
                && !known_topics.contains(*tag)
        })
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Sources whose recent interactions are predominantly negative and whose
/// trend is decreasing.
pub fn declining_sources(source_stats: &[AffinityStat]) -> Vec<String> {
    let mut declining: Vec<String> = source_stats
        .iter()
        .filter(|s| s.positive_ratio < 0.5 && s.trend == Trend::Decreasing)
        .map(|s| s.item.clone())
        .collect();
    declining.sort();
    declining
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleMetadata, InteractionAction};
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn interaction(
        action: InteractionAction,
        source: &str,
        hours_ago: i64,
        tags: &[&str],
    ) -> Interaction {
        Interaction {
            user_id: Uuid::nil(),
            article_id: Uuid::new_v4(),
            action,
            timestamp: Utc::now() - Duration::hours(hours_ago),
            metadata: ArticleMetadata {
                source: Some(source.to_string()),
                category: None,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        }
    }

    fn stat(item: &str, total: u32, positive: u32) -> AffinityStat {
        AffinityStat {
            item: item.to_string(),
            total_interactions: total,
            positive_interactions: positive,
            negative_interactions: total - positive,
            positive_ratio: positive as f64 / total as f64,
            last_interaction: Utc::now(),
            trend: Trend::Stable,
        }
    }

    #[test]
    fn test_confidence_gated_below_minimum() {
        let config = LearningConfig::default();
        for total in 0..5 {
            assert_eq!(learning_confidence(total, &config), 0.0);
        }
        assert!(learning_confidence(5, &config) > 0.0);
    }

    #[test]
    fn test_confidence_monotonic_and_bounded() {
        let config = LearningConfig::default();
        let mut previous = 0.0;
        for total in 5..200 {
            let confidence = learning_confidence(total, &config);
            assert!(confidence > previous);
            assert!(confidence < 1.0);
            previous = confidence;
        }
        // Saturates as the count passes several dozen
        assert!(learning_confidence(35, &config) > 0.85);
    }

    #[test]
    fn test_trend_margins() {
        assert_eq!(trend_from_counts(5, 1, 6), Trend::Increasing);
        assert_eq!(trend_from_counts(1, 5, 6), Trend::Decreasing);
        assert_eq!(trend_from_counts(3, 3, 6), Trend::Stable);
        // Margin of ceil(10 * 0.2) = 2: a one-count edge is stable
        assert_eq!(trend_from_counts(6, 5, 11), Trend::Stable);
    }

    #[test]
    fn test_aggregate_counts_polarity() {
        let interactions = vec![
            interaction(InteractionAction::Like, "techcrunch", 1, &[]),
            interaction(InteractionAction::ReadMore, "techcrunch", 2, &[]),
            interaction(InteractionAction::Hide, "cnn", 3, &[]),
        ];
        let mut stats = aggregate_affinities(&interactions, |i| i.metadata.source.as_deref());
        rank_affinities(&mut stats, 3);

        let techcrunch = stats.iter().find(|s| s.item == "techcrunch").unwrap();
        assert_eq!(techcrunch.total_interactions, 2);
        assert_eq!(techcrunch.positive_interactions, 2);
        assert!((techcrunch.positive_ratio - 1.0).abs() < f64::EPSILON);

        let cnn = stats.iter().find(|s| s.item == "cnn").unwrap();
        assert_eq!(cnn.negative_interactions, 1);
        assert_eq!(cnn.positive_ratio, 0.0);
    }

    #[test]
    fn test_aggregate_skips_absent_metadata() {
        let mut rows = vec![interaction(InteractionAction::Like, "techcrunch", 1, &[])];
        rows.push(Interaction {
            metadata: ArticleMetadata::default(),
            ..rows[0].clone()
        });
        let stats = aggregate_affinities(&rows, |i| i.metadata.source.as_deref());
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_interactions, 1);
    }

    #[test]
    fn test_ranking_prefers_clearly_higher_ratio_at_comparable_volume() {
        let mut stats = vec![stat("meh", 10, 6), stat("good", 10, 10)];
        rank_affinities(&mut stats, 3);
        assert_eq!(stats[0].item, "good");
    }

    #[test]
    fn test_ranking_volume_breaks_close_ratios() {
        // Same decile band: the much higher volume wins despite the
        // slightly lower exact ratio (0.80 vs 0.89).
        let mut stats = vec![stat("small", 9, 8), stat("large", 20, 16)];
        rank_affinities(&mut stats, 3);
        assert_eq!(stats[0].item, "large");
    }

    #[test]
    fn test_ranking_insignificant_volume_sinks() {
        // A single like never outranks a sustained signal.
        let mut stats = vec![stat("oneoff", 1, 1), stat("steady", 10, 7)];
        rank_affinities(&mut stats, 3);
        assert_eq!(stats[0].item, "steady");
    }

    #[test]
    fn test_emerging_topics_need_recent_concentration() {
        let interactions = vec![
            // "ai" is concentrated in the trailing window
            interaction(InteractionAction::Like, "a", 1, &["ai"]),
            interaction(InteractionAction::ReadMore, "a", 2, &["ai"]),
            // "sports" occurrences are mostly old
            interaction(InteractionAction::Like, "b", 1, &["sports"]),
            interaction(InteractionAction::Like, "b", 200, &["sports"]),
            interaction(InteractionAction::Like, "b", 201, &["sports"]),
            // negative interactions never contribute tags
            interaction(InteractionAction::Hide, "c", 1, &["crypto"]),
            interaction(InteractionAction::Hide, "c", 2, &["crypto"]),
        ];
        let known = BTreeSet::new();
        let emerging = emerging_topics(&interactions, &known, 48);
        assert_eq!(emerging, vec!["ai".to_string()]);
    }

    #[test]
    fn test_emerging_topics_exclude_known() {
        let interactions = vec![
            interaction(InteractionAction::Like, "a", 1, &["ai"]),
            interaction(InteractionAction::ReadMore, "a", 2, &["ai"]),
        ];
        let known: BTreeSet<String> = ["ai".to_string()].into_iter().collect();
        assert!(emerging_topics(&interactions, &known, 48).is_empty());
    }

    #[test]
    fn test_declining_sources_need_negative_and_decreasing() {
        let now: DateTime<Utc> = Utc::now();
        let mut falling = stat("cnn", 4, 0);
        falling.trend = Trend::Decreasing;
        falling.last_interaction = now;

        let mut negative_but_stable = stat("fox", 4, 0);
        negative_but_stable.trend = Trend::Stable;

        let mut decreasing_but_positive = stat("bbc", 4, 4);
        decreasing_but_positive.trend = Trend::Decreasing;

        let declining =
            declining_sources(&[falling, negative_but_stable, decreasing_but_positive]);
        assert_eq!(declining, vec!["cnn".to_string()]);
    }
}
