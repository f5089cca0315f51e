//! Storage traits for the policy corpus and its embeddings.
//!
//! - `PolicyStore`: canonical records keyed by identity
//! - `VectorIndex`: embeddings keyed by record id

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::policy::{IdentityKey, PolicyFilter, PolicyRecord};

/// Whether an upsert created a record or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// The policy corpus.
///
/// Upserts replace the whole record atomically: readers see either the old
/// or the new record, never a mix.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert or replace by identity key.
    ///
    /// On update, the stored `id` and first `crawl_time` are preserved.
    async fn upsert(&self, record: PolicyRecord) -> Result<UpsertOutcome>;

    async fn get(&self, id: &str) -> Result<Option<PolicyRecord>>;

    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<PolicyRecord>>;

    /// Records matching a filter, ordered by title then id.
    async fn list(&self, filter: &PolicyFilter) -> Result<Vec<PolicyRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// Nearest-neighbour index over record embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert_embedding(&self, id: &str, embedding: &[f32]) -> Result<()>;

    /// Up to `k` ids with similarity in [-1,1], most similar first.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<(String, f32)>>;
}

/// Cosine similarity between two vectors; 0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
