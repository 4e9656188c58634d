//! In-memory vector store
//!
//! Exact brute-force search over a `HashMap` guarded by a
//! `tokio::sync::RwLock`. Suitable for tests, demos, and small data sets;
//! contents are lost when the process exits.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use textvec_core::{
    CollectionSpec, DistanceMetric, ScoredRecord, SearchParams, StoreError, StoredRecord,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{StoreResult, VectorStore};

/// In-memory store for a single collection
#[derive(Debug)]
pub struct InMemoryStore {
    spec: CollectionSpec,
    /// `None` until the collection is created
    records: RwLock<Option<HashMap<Uuid, StoredRecord>>>,
}

impl InMemoryStore {
    /// Create a store; the collection itself is created by `ensure_collection`
    pub fn new(spec: CollectionSpec) -> Self {
        Self {
            spec,
            records: RwLock::new(None),
        }
    }

    /// Fetch a record by id
    pub async fn get(&self, id: Uuid) -> Option<StoredRecord> {
        self.records
            .read()
            .await
            .as_ref()
            .and_then(|records| records.get(&id).cloned())
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.as_ref().map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn missing(&self) -> StoreError {
        StoreError::CollectionMissing(self.spec.name.clone())
    }
}

/// Score `candidate` against `query` under `metric`
///
/// Cosine returns 0.0 when either vector has zero magnitude. Euclid returns
/// the distance, so lower is closer.
fn score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
            let norm_q: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_c: f32 = candidate.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_q == 0.0 || norm_c == 0.0 {
                return 0.0;
            }
            dot / (norm_q * norm_c)
        }
        DistanceMetric::Dot => query.iter().zip(candidate).map(|(a, b)| a * b).sum(),
        DistanceMetric::Euclid => query
            .iter()
            .zip(candidate)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt(),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn collection(&self) -> &CollectionSpec {
        &self.spec
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        if records.is_some() {
            tracing::debug!(collection = %self.spec.name, "Collection already exists");
            return Ok(false);
        }

        *records = Some(HashMap::new());
        tracing::info!(
            collection = %self.spec.name,
            dimension = self.spec.dimension,
            distance = %self.spec.distance,
            "Collection created"
        );
        Ok(true)
    }

    async fn insert(&self, record: StoredRecord) -> StoreResult<()> {
        if record.vector.len() != self.spec.dimension {
            return Err(StoreError::InvalidVector {
                expected: self.spec.dimension,
                actual: record.vector.len(),
            });
        }

        let mut guard = self.records.write().await;
        let records = guard.as_mut().ok_or_else(|| self.missing())?;
        records.insert(record.id, record);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut guard = self.records.write().await;
        let records = guard.as_mut().ok_or_else(|| self.missing())?;
        records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        _params: &SearchParams,
    ) -> StoreResult<Vec<ScoredRecord>> {
        if query.len() != self.spec.dimension {
            return Err(StoreError::InvalidVector {
                expected: self.spec.dimension,
                actual: query.len(),
            });
        }

        let guard = self.records.read().await;
        let records = guard.as_ref().ok_or_else(|| self.missing())?;

        let metric = self.spec.distance;
        let mut scored: Vec<ScoredRecord> = records
            .values()
            .map(|record| ScoredRecord {
                id: record.id,
                score: score(metric, query, &record.vector),
                text: record.text.clone(),
            })
            .collect();

        if metric.higher_is_better() {
            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        } else {
            scored.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
        }
        scored.truncate(top_k);

        Ok(scored)
    }
}
