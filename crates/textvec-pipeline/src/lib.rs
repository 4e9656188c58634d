//! textvec Pipeline - Ingestion and similarity-search orchestrator
//!
//! Composes the chunker, the embedding generator, and a vector store:
//! - ingest: text -> chunks -> embeddings -> stored ids
//! - query: text -> embedding -> ranked matches
//! - remove: id -> deleted record
//!
//! Every failure below this layer degrades to "skip this chunk" or "return
//! nothing"; none of the operations here return an error to the caller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textvec_chunker::TextSplitter;
use textvec_core::{
    AppConfig, ChunkingConfig, EmbeddingError, Result, ScoredRecord, SearchParams, StoreError,
};
use textvec_vector::{
    create_embedding_client, create_vector_store, EmbeddingClient, EmbeddingGenerator,
    VectorStore,
};
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Text splitting parameters
    pub chunking: ChunkingConfig,

    /// Number of matches returned by `query`
    pub top_k: usize,

    /// ANN tuning passed to every search
    pub search_params: SearchParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 3,
            search_params: SearchParams::default(),
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunking: config.chunking.clone(),
            top_k: config.search.top_k,
            search_params: config.vector.search_params(),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What happened to one chunk during ingestion
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// Embedded and written under `id`
    Stored { id: Uuid },
    /// No usable embedding; nothing was written
    EmbeddingFailed(EmbeddingError),
    /// Embedded, but the write was rejected
    StoreFailed(StoreError),
}

impl ChunkOutcome {
    /// Id of the stored record, if any
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Stored { id } => Some(*id),
            _ => None,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Text ingestion and search pipeline
pub struct Pipeline {
    splitter: TextSplitter,
    embedder: EmbeddingGenerator,
    store: Arc<dyn VectorStore>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline over injected clients
    ///
    /// The client must produce vectors of the store's collection dimension;
    /// every embedding is validated against it.
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let dimension = store.collection().dimension;
        if client.dimension() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: client.dimension(),
            }
            .into());
        }

        let splitter = TextSplitter::from_config(&config.chunking)?;
        let embedder = EmbeddingGenerator::new(client, dimension);

        Ok(Self {
            splitter,
            embedder,
            store,
            config,
        })
    }

    /// Build clients from application config and create a pipeline
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = create_embedding_client(&config.embedding)?;
        let store = create_vector_store(&config.vector, config.embedding.vector_dimension())?;
        Self::new(client, store, PipelineConfig::from(config))
    }

    /// Vector store in use
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Make sure the collection exists; returns `true` if it was created
    pub async fn bootstrap(&self) -> Result<bool> {
        let created = self.store.ensure_collection().await?;
        tracing::debug!(
            collection = %self.store.collection().name,
            backend = self.store.backend_name(),
            created,
            "Bootstrap complete"
        );
        Ok(created)
    }

    /// Split text with the configured chunk size and overlap
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.splitter.split(text)
    }

    /// Ingest text and return the ids of the stored chunks
    ///
    /// Chunks that could not be embedded or written are skipped, so the
    /// result may be shorter than the number of chunks. Use
    /// [`Pipeline::ingest_detailed`] to see which chunk each id belongs to.
    pub async fn ingest(&self, text: &str) -> Vec<Uuid> {
        let chunks = self.chunk(text);
        let embeddings = self.embedder.embed_many(&chunks).await;
        let vectors = embeddings.into_iter().map(|r| r.ok()).collect();

        let ids = self.store.upsert(&chunks, vectors).await;
        tracing::info!(chunks = chunks.len(), stored = ids.len(), "Ingest finished");
        ids
    }

    /// Ingest text and report the outcome of every chunk, in chunk order
    pub async fn ingest_detailed(&self, text: &str) -> Vec<ChunkOutcome> {
        let chunks = self.chunk(text);
        let embeddings = self.embedder.embed_many(&chunks).await;

        let mut outcomes = Vec::with_capacity(chunks.len());
        for (chunk_index, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            let outcome = match embedding {
                Err(e) => ChunkOutcome::EmbeddingFailed(e),
                Ok(vector) => match self.store.store_text(chunk, vector).await {
                    Ok(id) => ChunkOutcome::Stored { id },
                    Err(e) => {
                        tracing::warn!(chunk_index, error = %e, "Failed to store chunk");
                        ChunkOutcome::StoreFailed(e)
                    }
                },
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Nearest stored chunks to `text`, best first
    ///
    /// Returns an empty list when the query cannot be embedded or the search
    /// fails.
    pub async fn query(&self, text: &str, top_k: usize) -> Vec<ScoredRecord> {
        self.query_with(text, top_k, &self.config.search_params)
            .await
    }

    /// Query with the configured default `top_k`
    pub async fn query_default(&self, text: &str) -> Vec<ScoredRecord> {
        self.query(text, self.config.top_k).await
    }

    /// Query with explicit search parameters
    pub async fn query_with(
        &self,
        text: &str,
        top_k: usize,
        params: &SearchParams,
    ) -> Vec<ScoredRecord> {
        if top_k == 0 {
            return Vec::new();
        }

        let vector = match self.embedder.embed_one(text).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to generate a valid query embedding");
                return Vec::new();
            }
        };

        match self.store.search(&vector, top_k, params).await {
            Ok(results) => {
                tracing::debug!(top_k, hits = results.len(), "Search completed");
                results
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error during search");
                Vec::new()
            }
        }
    }

    /// Delete a stored chunk; returns whether a record was removed
    ///
    /// A missing id or a backend error is logged and reported as `false`.
    pub async fn remove(&self, id: Uuid) -> bool {
        match self.store.delete(id).await {
            Ok(()) => {
                tracing::info!(%id, "Deleted chunk");
                true
            }
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(%id, "Chunk to delete was not found");
                false
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "Failed to delete chunk");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
