//! textvec Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with defaults suitable for a local Qdrant and the OpenAI embedding API.

use crate::{DistanceMetric, SearchParams, EMBEDDING_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    pub vector: VectorConfig,

    /// Text splitting configuration
    pub chunking: ChunkingConfig,

    /// Query defaults
    pub search: SearchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Overlay values from a variable lookup onto this config
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Embedding
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.embedding.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.embedding.openai_base_url = url;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }
        if let Some(dimension) = lookup("EMBEDDING_DIMENSION") {
            self.embedding.dimension = Some(parse_value("EMBEDDING_DIMENSION", dimension)?);
        }

        // Qdrant
        if let Some(url) = lookup("QDRANT_URL") {
            self.vector.qdrant_url = url;
        } else if let Some(host) = lookup("QDRANT_HOST") {
            let port: u16 = match lookup("QDRANT_PORT") {
                Some(port) => parse_value("QDRANT_PORT", port)?,
                None => 6334,
            };
            self.vector.qdrant_url = format!("http://{host}:{port}");
        }
        if let Some(key) = lookup("QDRANT_API_KEY") {
            self.vector.qdrant_api_key = Some(key);
        }
        if let Some(collection) = lookup("QDRANT_COLLECTION") {
            self.vector.collection = collection;
        }
        if let Some(distance) = lookup("VECTOR_DISTANCE") {
            self.vector.distance = distance.parse()?;
        }
        if let Some(backend) = lookup("VECTOR_BACKEND") {
            self.vector.backend = backend.parse()?;
        }
        if let Some(ef) = lookup("HNSW_EF") {
            self.vector.hnsw_ef = parse_value("HNSW_EF", ef)?;
        }

        // Chunking
        if let Some(size) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_value("CHUNK_SIZE", size)?;
        }
        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_value("CHUNK_OVERLAP", overlap)?;
        }

        // Search
        if let Some(top_k) = lookup("SEARCH_TOP_K") {
            self.search.top_k = parse_value("SEARCH_TOP_K", top_k)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider to call
    pub provider: EmbeddingProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    pub openai_base_url: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name; defaults per provider
    pub model: Option<String>,

    /// Expected vector dimension; defaults per provider. Responses of any
    /// other length are rejected
    pub dimension: Option<usize>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: None,
            dimension: None,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    /// Configured model, or the provider's default
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Configured dimension, or the one the provider's default model produces
    pub fn vector_dimension(&self) -> usize {
        self.dimension
            .unwrap_or_else(|| self.provider.default_dimension())
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
}

impl EmbeddingProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "text-embedding-3-small",
            Self::Ollama => "nomic-embed-text",
        }
    }

    pub fn default_dimension(&self) -> usize {
        match self {
            Self::OpenAI => EMBEDDING_DIMENSION,
            Self::Ollama => 768,
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Which store implementation to use
    pub backend: StoreBackend,

    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Qdrant API key
    pub qdrant_api_key: Option<String>,

    /// Collection name
    pub collection: String,

    /// Distance metric for a newly created collection
    pub distance: DistanceMetric,

    /// HNSW exploration factor used at query time
    pub hnsw_ef: u64,

    /// Bypass the HNSW index and scan exhaustively
    pub exact: bool,
}

impl VectorConfig {
    /// Search parameters derived from this config
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            hnsw_ef: Some(self.hnsw_ef),
            exact: self.exact,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Qdrant,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_api_key: None,
            collection: "text_embeddings".to_string(),
            distance: DistanceMetric::Cosine,
            hnsw_ef: 128,
            exact: false,
        }
    }
}

/// Vector store implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Qdrant,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Text splitting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,

    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 10,
        }
    }
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of matches returned by default
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.vector_dimension(), 1536);
        assert_eq!(config.embedding.model_name(), "text-embedding-3-small");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 10);
        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.vector.collection, "text_embeddings");
        assert_eq!(config.vector.distance, DistanceMetric::Cosine);
        assert_eq!(config.vector.search_params(), SearchParams::default());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("QDRANT_HOST", "qdrant.internal"),
                ("QDRANT_PORT", "6400"),
                ("CHUNK_SIZE", "800"),
                ("VECTOR_BACKEND", "memory"),
            ]))
            .unwrap();

        assert_eq!(config.embedding.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.vector.qdrant_url, "http://qdrant.internal:6400");
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.vector.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_qdrant_url_wins_over_host() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("QDRANT_URL", "http://db:6334"),
                ("QDRANT_HOST", "ignored"),
            ]))
            .unwrap();
        assert_eq!(config.vector.qdrant_url, "http://db:6334");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("CHUNK_OVERLAP", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHUNK_OVERLAP"));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "openai".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::OpenAI
        );
        assert_eq!(
            "Ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert!("invalid".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[vector]\ncollection = \"docs\"\nhnsw_ef = 64\n\n[chunking]\nchunk_size = 300"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.vector.collection, "docs");
        assert_eq!(config.vector.hnsw_ef, 64);
        assert_eq!(config.chunking.chunk_size, 300);
        assert_eq!(config.chunking.chunk_overlap, 10);
        assert_eq!(config.embedding.model_name(), "text-embedding-3-small");
    }

    #[test]
    fn test_ollama_uses_its_own_model_defaults() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[("EMBEDDING_PROVIDER", "ollama")]))
            .unwrap();
        assert_eq!(config.embedding.model_name(), "nomic-embed-text");
        assert_eq!(config.embedding.vector_dimension(), 768);

        config
            .apply_env(lookup_from(&[
                ("EMBEDDING_MODEL", "mxbai-embed-large"),
                ("EMBEDDING_DIMENSION", "1024"),
            ]))
            .unwrap();
        assert_eq!(config.embedding.model_name(), "mxbai-embed-large");
        assert_eq!(config.embedding.vector_dimension(), 1024);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/textvec.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
