//! textvec Vector - Embedding clients and vector store adapters
//!
//! Provides the embedding generator and an abstraction over vector
//! databases (Qdrant, or an in-memory store for tests and offline runs)
//! for storing and searching chunk embeddings.

use async_trait::async_trait;
use std::sync::Arc;
use textvec_core::{
    CollectionSpec, Embedding, Result, ScoredRecord, SearchParams, StoreBackend, StoreError,
    StoredRecord, VectorConfig,
};
use uuid::Uuid;

pub mod embedding;
pub mod memory_store;
pub mod qdrant_store;

pub use embedding::{
    create_embedding_client, validate_embedding, EmbeddingClient, EmbeddingGenerator,
    OllamaEmbedding, OpenAiEmbedding,
};
pub use memory_store::InMemoryStore;
pub use qdrant_store::QdrantStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for vector database operations on a single collection
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection this store reads and writes
    fn collection(&self) -> &CollectionSpec;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Create the collection if it does not exist
    ///
    /// Returns `true` when the collection was created by this call. An
    /// existing collection is left untouched.
    async fn ensure_collection(&self) -> StoreResult<bool>;

    /// Write a single record
    async fn insert(&self, record: StoredRecord) -> StoreResult<()>;

    /// Remove a record; `StoreError::NotFound` if the id is absent
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Nearest records to `query`, best first
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        params: &SearchParams,
    ) -> StoreResult<Vec<ScoredRecord>>;

    /// Store a chunk under a freshly minted id
    async fn store_text(&self, text: &str, vector: Embedding) -> StoreResult<Uuid> {
        let record = StoredRecord::new(text, vector);
        let id = record.id;
        self.insert(record).await?;
        tracing::info!(
            collection = %self.collection().name,
            %id,
            "Stored document"
        );
        Ok(id)
    }

    /// Store every text whose vector is present
    ///
    /// Positions without a vector are skipped, as are positions whose write
    /// fails, so the result can be shorter than the input. Ids keep the
    /// relative order of the stored texts.
    async fn upsert(&self, texts: &[String], vectors: Vec<Option<Embedding>>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(texts.len());

        for (chunk_index, (text, vector)) in texts.iter().zip(vectors).enumerate() {
            let Some(vector) = vector else {
                tracing::debug!(chunk_index, "Skipping storage due to missing embedding");
                continue;
            };

            match self.store_text(text, vector).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    tracing::warn!(chunk_index, error = %e, "Failed to store chunk");
                }
            }
        }

        ids
    }
}

/// Create a vector store from config
pub fn create_vector_store(
    config: &VectorConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    let spec = CollectionSpec::new(&config.collection)
        .with_dimension(dimension)
        .with_distance(config.distance);

    match config.backend {
        StoreBackend::Qdrant => Ok(Arc::new(QdrantStore::new(config, spec)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new(spec))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_store() {
        let config = VectorConfig {
            backend: StoreBackend::Memory,
            collection: "scratch".to_string(),
            ..Default::default()
        };

        let store = create_vector_store(&config, 8).unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert_eq!(store.collection().name, "scratch");
        assert_eq!(store.collection().dimension, 8);
    }

    #[test]
    fn test_upsert_skips_absent_vectors() {
        let store = InMemoryStore::new(CollectionSpec::new("t").with_dimension(2));
        let texts: Vec<String> = ["first", "second", "third", "fourth"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let ids = tokio_test::block_on(async {
            store.ensure_collection().await.unwrap();
            store
                .upsert(
                    &texts,
                    vec![Some(vec![1.0, 0.0]), None, Some(vec![0.0, 1.0]), Some(vec![1.0])],
                )
                .await
        });

        // "second" had no vector, "fourth" has the wrong dimension
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        let stored = tokio_test::block_on(store.get(ids[1])).unwrap();
        assert_eq!(stored.text, "third");
    }

    #[test]
    fn test_upsert_mints_new_ids_for_identical_text() {
        let store = InMemoryStore::new(CollectionSpec::new("t").with_dimension(2));
        let texts = vec!["same".to_string()];

        let (first, second) = tokio_test::block_on(async {
            store.ensure_collection().await.unwrap();
            let first = store.upsert(&texts, vec![Some(vec![1.0, 1.0])]).await;
            let second = store.upsert(&texts, vec![Some(vec![1.0, 1.0])]).await;
            (first, second)
        });

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0], second[0]);
        assert_eq!(tokio_test::block_on(store.len()), 2);
    }
}
