//! In-memory collaborator implementations.
//!
//! Real enough to drive the integration tests and local runs: the vector
//! index does brute-force cosine similarity over stored chunks and honors
//! every filter field.

use super::{Embedder, InteractionStore, PreferenceStore, Result, SearchFilters, VectorHit,
    VectorIndex};
use crate::models::{ArticleMetadata, Interaction, PreferenceProfile, TextChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryInteractionStore {
    rows: DashMap<Uuid, Vec<Interaction>>,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractionStore for InMemoryInteractionStore {
    async fn insert(&self, interaction: &Interaction) -> Result<()> {
        self.rows
            .entry(interaction.user_id)
            .or_default()
            .push(interaction.clone());
        Ok(())
    }

    async fn query(
        &self,
        user_id: Uuid,
        limit: usize,
        join_metadata: bool,
    ) -> Result<Vec<Interaction>> {
        let mut rows = self
            .rows
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);
        if !join_metadata {
            for row in &mut rows {
                row.metadata = ArticleMetadata::default();
            }
        }
        Ok(rows)
    }

    async fn delete_older_than(&self, user_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut deleted = 0u64;
        if let Some(mut rows) = self.rows.get_mut(&user_id) {
            let before = rows.len();
            rows.retain(|r| r.timestamp >= cutoff);
            deleted = (before - rows.len()) as u64;
        }
        Ok(deleted)
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<()> {
        self.rows.remove(&user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    profiles: DashMap<Uuid, PreferenceProfile>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<PreferenceProfile>> {
        Ok(self.profiles.get(&user_id).map(|p| p.value().clone()))
    }

    async fn create(&self, profile: &PreferenceProfile) -> Result<PreferenceProfile> {
        self.profiles.insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn update(
        &self,
        user_id: Uuid,
        profile: &PreferenceProfile,
    ) -> Result<PreferenceProfile> {
        // Last write wins; concurrent writers are resolved here, not by the
        // engine.
        self.profiles.insert(user_id, profile.clone());
        Ok(profile.clone())
    }
}

/// Deterministic feature-hashing embedder: each whitespace token hashes to a
/// signed bucket and the result is L2-normalized. Identical text always
/// embeds to an identical vector.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hashed = hasher.finish();
            let bucket = (hashed % self.dims as u64) as usize;
            let sign = if (hashed >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[derive(Default)]
pub struct InMemoryVectorIndex {
    chunks: DashMap<Uuid, TextChunk>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&self, chunk: TextChunk) {
        self.chunks.insert(chunk.id, chunk);
    }

    fn matches(chunk: &TextChunk, filters: &SearchFilters) -> bool {
        if let Some(sources) = &filters.sources {
            match &chunk.metadata.source {
                Some(source) if sources.contains(source) => {}
                _ => return false,
            }
        }
        if let Some(categories) = &filters.categories {
            match &chunk.metadata.category {
                Some(category) if categories.contains(category) => {}
                _ => return false,
            }
        }
        if let Some((start, end)) = &filters.date_range {
            match &chunk.metadata.published_at {
                Some(published) if published >= start && published <= end => {}
                _ => return false,
            }
        }
        true
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let min_relevance = filters.min_relevance.unwrap_or(f32::MIN);
        let mut hits: Vec<VectorHit> = self
            .chunks
            .iter()
            .filter(|entry| Self::matches(entry.value(), filters))
            .filter_map(|entry| {
                let relevance = cosine_similarity(embedding, &entry.embedding);
                if relevance >= min_relevance {
                    Some(VectorHit {
                        chunk: entry.value().clone(),
                        relevance,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn chunks_for_article(&self, article_id: Uuid) -> Result<Vec<TextChunk>> {
        let mut chunks: Vec<TextChunk> = self
            .chunks
            .iter()
            .filter(|entry| entry.article_id == article_id)
            .map(|entry| entry.value().clone())
            .collect();
        chunks.sort_by_key(|c| c.metadata.chunk_index);
        Ok(chunks)
    }

    async fn chunks_published_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TextChunk>> {
        Ok(self
            .chunks
            .iter()
            .filter(|entry| {
                entry
                    .metadata
                    .published_at
                    .map(|published| published >= cutoff)
                    .unwrap_or(false)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}
