//! Qdrant implementation for vector storage
//!
//! Provides connection management and point operations for chunk
//! embeddings. Search runs on Qdrant's HNSW index; `SearchParams` tunes the
//! exploration factor independently of the result limit.

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointId,
    PointStruct, PointsIdsList, SearchParamsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use textvec_core::{
    CollectionSpec, DistanceMetric, Result, ScoredRecord, SearchParams, StoreError, StoredRecord,
    VectorConfig,
};
use uuid::Uuid;

use crate::{StoreResult, VectorStore};

const BACKEND: &str = "qdrant";

/// Payload key holding the chunk text
const TEXT_KEY: &str = "text";

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    spec: CollectionSpec,
}

impl QdrantStore {
    /// Create a new Qdrant connection
    pub fn new(config: &VectorConfig, spec: CollectionSpec) -> Result<Self> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .api_key(config.qdrant_api_key.clone())
            .build()
            .map_err(|e| StoreError::backend(BACKEND, format!("connection failed: {e}")))?;

        Ok(Self::from_client(client, spec))
    }

    /// Wrap an existing client
    pub fn from_client(client: Qdrant, spec: CollectionSpec) -> Self {
        Self { client, spec }
    }

    fn map_err(e: qdrant_client::QdrantError) -> StoreError {
        StoreError::backend(BACKEND, e)
    }
}

fn to_qdrant_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Dot => Distance::Dot,
        DistanceMetric::Euclid => Distance::Euclid,
    }
}

fn to_point_id(id: Uuid) -> PointId {
    PointId::from(id.to_string())
}

/// Parse a point id back into a `Uuid`; numeric ids are not ours
fn from_point_id(id: Option<PointId>) -> Option<Uuid> {
    match id?.point_id_options? {
        PointIdOptions::Uuid(s) => Uuid::parse_str(&s).ok(),
        PointIdOptions::Num(_) => None,
    }
}

fn to_search_params(params: &SearchParams) -> SearchParamsBuilder {
    let builder = SearchParamsBuilder::default().exact(params.exact);
    match params.hnsw_ef {
        Some(ef) => builder.hnsw_ef(ef),
        None => builder,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn collection(&self) -> &CollectionSpec {
        &self.spec
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ensure_collection(&self) -> StoreResult<bool> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.spec.name);

        if exists {
            tracing::debug!(collection = %self.spec.name, "Collection already exists");
            return Ok(false);
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.spec.name).vectors_config(
                    VectorParamsBuilder::new(
                        self.spec.dimension as u64,
                        to_qdrant_distance(self.spec.distance),
                    ),
                ),
            )
            .await
            .map_err(Self::map_err)?;

        tracing::info!(
            collection = %self.spec.name,
            dimension = self.spec.dimension,
            distance = %self.spec.distance,
            "Collection created"
        );
        Ok(true)
    }

    async fn insert(&self, record: StoredRecord) -> StoreResult<()> {
        let payload: HashMap<String, Value> =
            HashMap::from([(TEXT_KEY.to_string(), Value::from(record.text))]);

        let point = PointStruct::new(record.id.to_string(), record.vector, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.spec.name, vec![point]).wait(true))
            .await
            .map_err(Self::map_err)?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        // Qdrant acknowledges deletes of unknown ids, so check first
        let existing = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.spec.name, vec![to_point_id(id)])
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(Self::map_err)?;

        if existing.result.is_empty() {
            return Err(StoreError::NotFound(id));
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.spec.name)
                    .points(PointsIdsList {
                        ids: vec![to_point_id(id)],
                    })
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        tracing::debug!(collection = %self.spec.name, %id, "Deleted point");
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        params: &SearchParams,
    ) -> StoreResult<Vec<ScoredRecord>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.spec.name, query.to_vec(), top_k as u64)
                    .with_payload(true)
                    .params(to_search_params(params)),
            )
            .await
            .map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = from_point_id(point.id)?;
                let text = point
                    .payload
                    .get(TEXT_KEY)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();

                Some(ScoredRecord {
                    id,
                    score: point.score,
                    text,
                })
            })
            .collect();

        Ok(results)
    }
}
