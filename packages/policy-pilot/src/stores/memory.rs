//! In-memory corpus and vector index.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{PilotError, Result};
use crate::extract::builder::prepare_upsert;
use crate::traits::store::{cosine_similarity, PolicyStore, UpsertOutcome, VectorIndex};
use crate::types::policy::{IdentityKey, PolicyFilter, PolicyRecord};

/// In-memory storage for policy records and their embeddings.
///
/// Records are keyed by id, which is derived from the identity key, so an
/// identity lookup is a keyed lookup. Data is lost on drop; use
/// [`MemoryStore::snapshot`] and [`MemoryStore::from_records`] to persist.
pub struct MemoryStore {
    records: RwLock<HashMap<String, PolicyRecord>>,
    embeddings: RwLock<HashMap<String, Vec<f32>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            embeddings: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a store from previously exported records.
    ///
    /// Records sharing an identity collapse into the last one given.
    pub fn from_records(records: impl IntoIterator<Item = PolicyRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.identity_key().record_id(), record))
            .collect();
        Self {
            records: RwLock::new(map),
            embeddings: RwLock::new(HashMap::new()),
        }
    }

    /// All records ordered by title then id.
    pub fn snapshot(&self) -> Result<Vec<PolicyRecord>> {
        let records = self.records.read().map_err(|_| PilotError::lock_poisoned())?;
        let mut all: Vec<_> = records.values().cloned().collect();
        sort_records(&mut all);
        Ok(all)
    }

    pub fn embedding_count(&self) -> Result<usize> {
        Ok(self
            .embeddings
            .read()
            .map_err(|_| PilotError::lock_poisoned())?
            .len())
    }

    pub fn clear(&self) -> Result<()> {
        self.records
            .write()
            .map_err(|_| PilotError::lock_poisoned())?
            .clear();
        self.embeddings
            .write()
            .map_err(|_| PilotError::lock_poisoned())?
            .clear();
        Ok(())
    }
}

fn sort_records(records: &mut [PolicyRecord]) {
    records.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn upsert(&self, record: PolicyRecord) -> Result<UpsertOutcome> {
        let key = record.identity_key().record_id();
        let mut records = self.records.write().map_err(|_| PilotError::lock_poisoned())?;

        let (record, outcome) = prepare_upsert(records.get(&key), record);
        records.insert(key, record);
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> Result<Option<PolicyRecord>> {
        let records = self.records.read().map_err(|_| PilotError::lock_poisoned())?;
        Ok(records
            .get(id)
            .or_else(|| records.values().find(|r| r.id == id))
            .cloned())
    }

    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<PolicyRecord>> {
        let records = self.records.read().map_err(|_| PilotError::lock_poisoned())?;
        Ok(records.get(&key.record_id()).cloned())
    }

    async fn list(&self, filter: &PolicyFilter) -> Result<Vec<PolicyRecord>> {
        let records = self.records.read().map_err(|_| PilotError::lock_poisoned())?;
        let mut matching: Vec<_> = records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        sort_records(&mut matching);
        Ok(matching)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self
            .records
            .read()
            .map_err(|_| PilotError::lock_poisoned())?
            .len())
    }
}

#[async_trait]
impl VectorIndex for MemoryStore {
    async fn upsert_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(PilotError::invalid_argument("embedding must not be empty"));
        }
        self.embeddings
            .write()
            .map_err(|_| PilotError::lock_poisoned())?
            .insert(id.to_string(), embedding.to_vec());
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        let embeddings = self.embeddings.read().map_err(|_| PilotError::lock_poisoned())?;

        let mut scored: Vec<(String, f32)> = embeddings
            .iter()
            .filter(|(_, stored)| stored.len() == embedding.len())
            .map(|(id, stored)| (id.clone(), cosine_similarity(embedding, stored)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_policy;
    use chrono::{Duration, NaiveDate};

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = MemoryStore::new();
        let record = sample_policy("徐汇区AI扶持办法");

        let outcome = store.upsert(record.clone()).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(store.count().await.unwrap(), 1);

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        let by_key = store
            .find_by_identity(&record.identity_key())
            .await
            .unwrap();
        assert!(by_key.is_some());
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_first_crawl_time() {
        let store = MemoryStore::new();
        let first = sample_policy("同一政策");
        store.upsert(first.clone()).await.unwrap();

        let mut second = sample_policy("同一政策");
        second.raw_content = "新版本内容".into();
        second.max_amount = Some(800_000);
        second.crawl_time = first.crawl_time + Duration::days(3);
        second.updated_at = second.crawl_time;

        let outcome = store.upsert(second.clone()).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(store.count().await.unwrap(), 1);

        let stored = store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.raw_content, "新版本内容");
        assert_eq!(stored.max_amount, Some(800_000));
        assert_eq!(stored.crawl_time, first.crawl_time);
        assert_eq!(stored.updated_at, second.crawl_time);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let mut b = sample_policy("B 政策");
        b.region = "上海市徐汇区".into();
        let mut a = sample_policy("A 政策");
        a.region = "北京市海淀区".into();
        a.deadline = NaiveDate::from_ymd_opt(2020, 1, 1);
        let mut c = sample_policy("C 政策");
        c.region = "全国".into();

        let store = MemoryStore::from_records([b, a, c]);

        let all = store.list(&PolicyFilter::new()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["A 政策", "B 政策", "C 政策"]);

        let xuhui = store
            .list(&PolicyFilter::new().with_region("徐汇"))
            .await
            .unwrap();
        assert_eq!(xuhui.len(), 2);

        let active = store
            .list(&PolicyFilter::new().active_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
            .await
            .unwrap();
        assert!(active.iter().all(|r| r.title != "A 政策"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = MemoryStore::new();
        store.upsert(sample_policy("一")).await.unwrap();
        store.upsert(sample_policy("二")).await.unwrap();

        let json = serde_json::to_string(&store.snapshot().unwrap()).unwrap();
        let restored = MemoryStore::from_records(
            serde_json::from_str::<Vec<PolicyRecord>>(&json).unwrap(),
        );
        assert_eq!(restored.count().await.unwrap(), 2);
        assert_eq!(restored.snapshot().unwrap(), store.snapshot().unwrap());
    }

    #[tokio::test]
    async fn test_vector_query_orders_by_similarity() {
        let store = MemoryStore::new();
        store.upsert_embedding("near", &[1.0, 0.0, 0.0]).await.unwrap();
        store.upsert_embedding("far", &[0.0, 1.0, 0.0]).await.unwrap();
        store.upsert_embedding("mid", &[0.7, 0.7, 0.0]).await.unwrap();
        store.upsert_embedding("wrong_dim", &[1.0, 0.0]).await.unwrap();

        let hits = store.query(&[0.9, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "near");
        assert_eq!(hits[1].0, "mid");
        assert!(hits[0].1 > 0.9);
    }

    #[tokio::test]
    async fn test_empty_embedding_rejected() {
        let store = MemoryStore::new();
        assert!(store.upsert_embedding("x", &[]).await.is_err());
        assert_eq!(store.embedding_count().unwrap(), 0);
    }
}
