//! textvec Core - Shared types, error taxonomy, and configuration
//!
//! This crate defines the abstractions shared by the chunker, the
//! embedding/vector layer, and the ingestion pipeline:
//! - Error types for each failure domain (chunking, embedding, storage)
//! - Stored and scored record models
//! - Collection and search parameter types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ChunkingConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LoggingConfig,
    SearchConfig, StoreBackend, VectorConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Dimensionality produced by `text-embedding-3-small` and `text-embedding-ada-002`
pub const EMBEDDING_DIMENSION: usize = 1536;

/// A dense embedding vector
pub type Embedding = Vec<f32>;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while configuring the text splitter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("Invalid chunker configuration: {0}")]
    InvalidConfig(String),
}

/// Why a single chunk has no embedding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Transport-level failure talking to the embedding service
    #[error("Embedding request failed: {0}")]
    Request(String),

    /// The service answered with a non-success HTTP status
    #[error("Embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be interpreted as an embedding
    #[error("Malformed embedding response: {0}")]
    Malformed(String),

    /// The vector has the wrong number of elements
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector contains NaN or infinite values
    #[error("Embedding contains a non-finite value at index {index}")]
    NonFinite { index: usize },
}

/// Errors raised by vector store backends
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Collection does not exist: {0}")]
    CollectionMissing(String),

    #[error("Vector has {actual} dimensions, collection expects {expected}")]
    InvalidVector { expected: usize, actual: usize },

    #[error("Vector store error ({backend}): {message}")]
    Backend { backend: String, message: String },
}

impl StoreError {
    /// Build a backend error from any displayable source
    pub fn backend(backend: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: err.to_string(),
        }
    }
}

/// Umbrella error for setup paths (configuration, client construction, bootstrap)
#[derive(Error, Debug)]
pub enum TextvecError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chunker(#[from] ChunkerError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TextvecError>;

// ============================================================================
// Collection Models
// ============================================================================

/// Distance metric configured on a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl DistanceMetric {
    /// Whether a larger raw score means a closer match
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Self::Euclid)
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Dot => write!(f, "dot"),
            Self::Euclid => write!(f, "euclid"),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" => Ok(Self::Euclid),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_DISTANCE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Name, dimensionality, and metric of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: DistanceMetric,
}

impl CollectionSpec {
    /// Create a cosine collection spec with the default dimension
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: EMBEDDING_DIMENSION,
            distance: DistanceMetric::Cosine,
        }
    }

    /// Set dimension
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set distance metric
    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }
}

/// Tuning knobs for approximate nearest-neighbour search
///
/// `hnsw_ef` controls how many candidates the HNSW graph walk keeps; it is
/// independent of how many results are returned. `exact` bypasses the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub hnsw_ef: Option<u64>,
    pub exact: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            hnsw_ef: Some(128),
            exact: false,
        }
    }
}

impl SearchParams {
    /// Set the exploration factor
    pub fn with_hnsw_ef(mut self, ef: u64) -> Self {
        self.hnsw_ef = Some(ef);
        self
    }

    /// Request an exact (full scan) search
    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }
}

// ============================================================================
// Record Models
// ============================================================================

/// A chunk persisted in the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Random identifier minted at storage time
    pub id: Uuid,

    /// Embedding of `text`
    pub vector: Embedding,

    /// Chunk text, stored as the `text` payload key
    pub text: String,
}

impl StoredRecord {
    /// Create a record with a freshly minted id
    pub fn new(text: impl Into<String>, vector: Embedding) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
        }
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: Uuid,

    /// Similarity score (higher is more similar for cosine and dot)
    pub score: f32,

    pub text: String,
}

// ============================================================================
// Tests
// ============================================================================
