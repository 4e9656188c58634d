//! Embedding clients and the per-chunk embedding generator
//!
//! Supports OpenAI-compatible and Ollama embedding APIs. The generator
//! validates every vector and isolates failures to the chunk that caused
//! them.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use textvec_core::{
    ConfigError, Embedding, EmbeddingConfig, EmbeddingError, EmbeddingProvider, Result,
};

/// Number of leading elements included in per-chunk diagnostics
const PREVIEW_LEN: usize = 10;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding services
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate the raw embedding for a single text
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError>;

    /// Dimension the model is expected to produce
    fn dimension(&self) -> usize;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            model: config.model_name().to_string(),
            dimension: config.vector_dimension(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let request = OpenAiEmbeddingRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Malformed("response contained no embedding".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model_name().to_string(),
            dimension: config.vector_dimension(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        Ok(result.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbeddingError::Request(format!("Failed to build HTTP client: {e}")).into())
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::OpenAI => Ok(Arc::new(OpenAiEmbedding::from_config(config)?)),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedding::from_config(config)?)),
    }
}

// ============================================================================
// Embedding Generator
// ============================================================================

/// Check that a raw vector has the expected shape and only finite values
pub fn validate_embedding(
    raw: Vec<f32>,
    expected: usize,
) -> std::result::Result<Embedding, EmbeddingError> {
    if raw.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: raw.len(),
        });
    }
    if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFinite { index });
    }
    Ok(raw)
}

/// Embeds chunks one at a time, turning every failure into a per-chunk `Err`
#[derive(Clone)]
pub struct EmbeddingGenerator {
    client: Arc<dyn EmbeddingClient>,
    dimension: usize,
}

impl EmbeddingGenerator {
    /// Create a generator that accepts only `dimension`-length vectors
    pub fn new(client: Arc<dyn EmbeddingClient>, dimension: usize) -> Self {
        Self { client, dimension }
    }

    /// Embed a single text and validate the result
    pub async fn embed_one(&self, text: &str) -> std::result::Result<Embedding, EmbeddingError> {
        let raw = self.client.embed(text).await?;
        validate_embedding(raw, self.dimension)
    }

    /// Embed each chunk in order
    ///
    /// The output has the same length and order as `chunks`. Calls are made
    /// sequentially; a failure never stops the remaining chunks.
    pub async fn embed_many(
        &self,
        chunks: &[String],
    ) -> Vec<std::result::Result<Embedding, EmbeddingError>> {
        let mut results = Vec::with_capacity(chunks.len());

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let result = self.embed_one(chunk).await;
            match &result {
                Ok(vector) => {
                    let preview = &vector[..vector.len().min(PREVIEW_LEN)];
                    tracing::debug!(
                        chunk_index,
                        model = self.client.model(),
                        ?preview,
                        "Valid embedding received"
                    );
                }
                Err(e) => {
                    tracing::warn!(chunk_index, error = %e, "Embedding failed for chunk");
                }
            }
            results.push(result);
        }

        results
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed response per call index
    struct SequenceClient {
        responses: Vec<std::result::Result<Vec<f32>, EmbeddingError>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for SequenceClient {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses[i].clone()
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model(&self) -> &str {
            "sequence"
        }
    }

    #[test]
    fn test_ollama_from_config() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Ollama,
            ollama_url: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let client = OllamaEmbedding::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "nomic-embed-text");
        assert_eq!(client.dimension(), 768);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = EmbeddingConfig::default();
        let err = OpenAiEmbedding::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_factory_uses_configured_dimension() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Ollama,
            model: Some("custom-model".to_string()),
            dimension: Some(1536),
            ..Default::default()
        };
        let client = create_embedding_client(&config).unwrap();
        assert_eq!(client.dimension(), 1536);
        assert_eq!(client.model(), "custom-model");
    }

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(vec![0.5; 1536], 1536).is_ok());
        assert_eq!(
            validate_embedding(vec![0.1, 0.2, 0.3], 1536),
            Err(EmbeddingError::DimensionMismatch {
                expected: 1536,
                actual: 3
            })
        );
        assert_eq!(
            validate_embedding(vec![0.0, f32::NAN, 1.0], 3),
            Err(EmbeddingError::NonFinite { index: 1 })
        );
        assert!(validate_embedding(Vec::new(), 1536).is_err());
    }

    #[test]
    fn test_embed_many_isolates_failures() {
        let client = Arc::new(SequenceClient {
            responses: vec![
                Ok(vec![1.0, 0.0, 0.0, 0.0]),
                Err(EmbeddingError::Request("connection reset".to_string())),
                Ok(vec![1.0, 2.0, 3.0]),
                Ok(vec![0.0, 1.0, 0.0, 0.0]),
            ],
            calls: AtomicUsize::new(0),
        });
        let generator = EmbeddingGenerator::new(client.clone(), 4);

        let chunks: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let results = tokio_test::block_on(generator.embed_many(&chunks));

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(EmbeddingError::Request(_))));
        assert!(matches!(
            results[2],
            Err(EmbeddingError::DimensionMismatch { actual: 3, .. })
        ));
        assert_eq!(results[3].as_ref().unwrap(), &vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    // ------------------------------------------------------------------------
    // HTTP clients against a mock server
    // ------------------------------------------------------------------------

    mod http {
        use super::*;
        use serde_json::json;
        use textvec_core::EMBEDDING_DIMENSION;
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn openai(server: &MockServer) -> OpenAiEmbedding {
            OpenAiEmbedding::from_config(&EmbeddingConfig {
                openai_api_key: Some("sk-test".to_string()),
                openai_base_url: format!("{}/v1/", server.uri()),
                ..Default::default()
            })
            .unwrap()
        }

        fn ollama(base_url: String) -> OllamaEmbedding {
            OllamaEmbedding::from_config(&EmbeddingConfig {
                provider: EmbeddingProvider::Ollama,
                ollama_url: base_url,
                dimension: Some(EMBEDDING_DIMENSION),
                ..Default::default()
            })
            .unwrap()
        }

        async fn mount_openai(server: &MockServer, response: ResponseTemplate) {
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .respond_with(response)
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_openai_valid_response() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .and(header("authorization", "Bearer sk-test"))
                .and(body_partial_json(json!({
                    "input": "hello world",
                    "model": "text-embedding-3-small"
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": [{ "embedding": vec![0.25f32; EMBEDDING_DIMENSION] }]
                })))
                .mount(&server)
                .await;

            let vector = openai(&server).embed("hello world").await.unwrap();
            assert_eq!(vector.len(), EMBEDDING_DIMENSION);
            assert_eq!(vector[0], 0.25);
        }

        #[tokio::test]
        async fn test_openai_error_status() {
            let server = MockServer::start().await;
            mount_openai(
                &server,
                ResponseTemplate::new(500).set_body_string("upstream exploded"),
            )
            .await;

            let err = openai(&server).embed("hello").await.unwrap_err();
            assert_eq!(
                err,
                EmbeddingError::Status {
                    status: 500,
                    body: "upstream exploded".to_string()
                }
            );
        }

        #[tokio::test]
        async fn test_openai_empty_data_is_malformed() {
            let server = MockServer::start().await;
            mount_openai(
                &server,
                ResponseTemplate::new(200).set_body_json(json!({ "data": [] })),
            )
            .await;

            let err = openai(&server).embed("hello").await.unwrap_err();
            assert!(matches!(err, EmbeddingError::Malformed(_)));
        }

        #[tokio::test]
        async fn test_openai_non_numeric_element_is_malformed() {
            let server = MockServer::start().await;
            mount_openai(
                &server,
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [{ "embedding": [0.1, "oops", 0.3] }] })),
            )
            .await;

            let err = openai(&server).embed("hello").await.unwrap_err();
            assert!(matches!(err, EmbeddingError::Malformed(_)));
        }

        #[tokio::test]
        async fn test_openai_non_json_body_is_malformed() {
            let server = MockServer::start().await;
            mount_openai(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

            let err = openai(&server).embed("hello").await.unwrap_err();
            assert!(matches!(err, EmbeddingError::Malformed(_)));
        }

        #[tokio::test]
        async fn test_ollama_responses() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/embeddings"))
                .and(body_partial_json(json!({ "prompt": "good" })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "embedding": vec![0.5f32; EMBEDDING_DIMENSION]
                })))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/embeddings"))
                .and(body_partial_json(json!({ "prompt": "broken" })))
                .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/embeddings"))
                .and(body_partial_json(json!({ "prompt": "garbled" })))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "embedding": ["x"] })),
                )
                .mount(&server)
                .await;

            let client = ollama(server.uri());
            assert_eq!(
                client.embed("good").await.unwrap().len(),
                EMBEDDING_DIMENSION
            );
            assert!(matches!(
                client.embed("broken").await,
                Err(EmbeddingError::Status { status: 500, .. })
            ));
            assert!(matches!(
                client.embed("garbled").await,
                Err(EmbeddingError::Malformed(_))
            ));
        }

        #[tokio::test]
        async fn test_unreachable_service_is_request_error() {
            // Nothing listens on the discard port
            let client = ollama("http://127.0.0.1:9".to_string());
            assert!(matches!(
                client.embed("hello").await,
                Err(EmbeddingError::Request(_))
            ));
        }

        #[tokio::test]
        async fn test_generator_isolates_http_failures() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .and(body_partial_json(json!({ "input": "fails" })))
                .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .and(body_partial_json(json!({ "input": "short" })))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] })),
                )
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .and(body_partial_json(json!({ "input": "works" })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": [{ "embedding": vec![1.0f32; EMBEDDING_DIMENSION] }]
                })))
                .mount(&server)
                .await;

            let generator = EmbeddingGenerator::new(Arc::new(openai(&server)), EMBEDDING_DIMENSION);
            let chunks: Vec<String> = ["fails", "short", "works"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let results = generator.embed_many(&chunks).await;

            assert_eq!(results.len(), 3);
            assert!(matches!(
                results[0],
                Err(EmbeddingError::Status { status: 429, .. })
            ));
            assert!(matches!(
                results[1],
                Err(EmbeddingError::DimensionMismatch { actual: 3, .. })
            ));
            assert_eq!(results[2].as_ref().unwrap().len(), EMBEDDING_DIMENSION);
        }
    }
}
