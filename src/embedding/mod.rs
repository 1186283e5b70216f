//! Document embeddings: chunk, embed each chunk, mean-pool into one normalized vector.

mod providers;

pub use providers::{HashingClient, OllamaClient, OpenAiClient};

use crate::config::{Config, EmbeddingProvider};
use crate::processing::chunking::{self, ChunkingError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Largest number of chunks sent to a provider in one request.
const MAX_BATCH: usize = 64;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached or rejected the credential.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a payload we could not use.
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by the embedding stage.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// There is no text to embed.
    #[error("no text to embed")]
    EmptyText,
    /// The text could not be chunked.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// The provider failed.
    #[error(transparent)]
    Backend(#[from] EmbeddingClientError),
    /// The provider returned a vector of the wrong length.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Length the provider returned.
        actual: usize,
    },
    /// The provider did not answer in time.
    #[error("embedding timed out after {0:?}")]
    Timeout(Duration),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Short provider label used in logs.
    fn provider_name(&self) -> &'static str;
}

/// One pooled, L2-normalized vector for a document.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingVector {
    /// Model that produced the chunk vectors.
    pub model: String,
    /// Vector length.
    pub dimension: usize,
    /// Number of chunks that were pooled.
    pub chunk_count: usize,
    /// Vector components.
    pub values: Vec<f32>,
}

/// Embedding stage.
#[derive(Clone)]
pub struct Embedder {
    client: Arc<dyn EmbeddingClient>,
    provider: EmbeddingProvider,
    model: String,
    dimension: usize,
    chunk_size: usize,
    timeout: Duration,
}

impl Embedder {
    /// Wire an embedder around an explicit client.
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        provider: EmbeddingProvider,
        model: impl Into<String>,
        dimension: usize,
        chunk_size_override: Option<usize>,
        timeout: Duration,
    ) -> Self {
        let model = model.into();
        let chunk_size = chunking::determine_chunk_size(chunk_size_override, provider, &model);
        Self {
            client,
            provider,
            model,
            dimension,
            chunk_size,
            timeout,
        }
    }

    /// Build the embedder selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        Ok(Self::new(
            build_embedding_client(config)?,
            config.embedding_provider,
            config.embedding_model.clone(),
            config.embedding_dimension,
            config.text_splitter_chunk_size,
            config.remote_timeout,
        ))
    }

    /// Configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Configured vector length.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed `text` into a single vector.
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let chunks = chunking::chunk_text(text, self.chunk_size, self.provider, &self.model)?;
        if chunks.is_empty() {
            return Err(EmbeddingError::EmptyText);
        }
        let chunk_count = chunks.len();
        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            chunk_count,
            chunk_size = self.chunk_size,
            "Embedding document"
        );

        let mut pooled = vec![0.0_f32; self.dimension];
        for vector in self.embed_batches(&chunks).await? {
            for (slot, value) in pooled.iter_mut().zip(vector) {
                *slot += value;
            }
        }

        let count = chunk_count as f32;
        for value in &mut pooled {
            *value /= count;
        }
        // Text without a single word token (rules, dots, asterisks) hashes to nothing.
        if !normalize(&mut pooled) {
            return Err(EmbeddingError::EmptyText);
        }

        Ok(EmbeddingVector {
            model: self.model.clone(),
            dimension: self.dimension,
            chunk_count,
            values: pooled,
        })
    }

    /// Embed each text separately, without chunking or pooling. Vectors are unit length, or all
    /// zeros for texts with no content.
    pub async fn embed_each(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = self.embed_batches(texts).await?;
        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }

    async fn embed_batches(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let request = self.client.generate_embeddings(batch.to_vec());
            let vectors = tokio::time::timeout(self.timeout, request)
                .await
                .map_err(|_| EmbeddingError::Timeout(self.timeout))??;
            if vectors.len() != batch.len() {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                ))
                .into());
            }
            for vector in vectors {
                if vector.len() != self.dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimension,
                        actual: vector.len(),
                    });
                }
                all.push(vector);
            }
        }
        Ok(all)
    }
}

/// Scale to unit length. Returns `false` for the zero vector, which is left untouched.
fn normalize(values: &mut [f32]) -> bool {
    let norm = values.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm <= 0.0 || !norm.is_finite() {
        return false;
    }
    for value in values {
        *value /= norm;
    }
    true
}

/// Build an embedding client suitable for the supplied configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Hashing => Arc::new(HashingClient::new(config.embedding_dimension)),
        EmbeddingProvider::Ollama => Arc::new(OllamaClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            config.remote_timeout,
        )?),
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::ProviderUnavailable(
                    "OPENAI_API_KEY is required for the openai embedding provider".to_string(),
                )
            })?;
            Arc::new(OpenAiClient::new(
                config.openai_base_url.clone(),
                api_key,
                config.embedding_model.clone(),
                Some(config.embedding_dimension),
                config.remote_timeout,
            )?)
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClient {
        vectors: Vec<Vec<f32>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for FixedClient {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .enumerate()
                .map(|(index, _)| self.vectors[index % self.vectors.len()].clone())
                .collect())
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct SlowClient;

    #[async_trait]
    impl EmbeddingClient for SlowClient {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![vec![1.0]; texts.len()])
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    fn embedder(client: Arc<dyn EmbeddingClient>, dimension: usize, chunk: usize) -> Embedder {
        Embedder::new(
            client,
            EmbeddingProvider::Hashing,
            "test-model",
            dimension,
            Some(chunk),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn pools_chunks_into_unit_vector() {
        let client = Arc::new(FixedClient {
            vectors: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            calls: AtomicUsize::new(0),
        });
        let vector = embedder(client.clone(), 2, 2)
            .embed("one two three four")
            .await
            .expect("vector");

        assert_eq!(vector.chunk_count, 2);
        assert_eq!(vector.dimension, 2);
        let expected = 1.0 / 2.0_f32.sqrt();
        assert!((vector.values[0] - expected).abs() < 1e-6);
        assert!((vector.values[1] - expected).abs() < 1e-6);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let client = Arc::new(FixedClient {
            vectors: vec![vec![1.0, 0.0, 0.0]],
            calls: AtomicUsize::new(0),
        });
        let error = embedder(client, 2, 64).embed("text").await.unwrap_err();
        assert!(matches!(
            error,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_the_backend() {
        let client = Arc::new(FixedClient {
            vectors: vec![vec![1.0]],
            calls: AtomicUsize::new(0),
        });
        let error = embedder(client.clone(), 1, 64).embed(" \n ").await.unwrap_err();
        assert!(matches!(error, EmbeddingError::EmptyText));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_without_word_tokens_is_rejected() {
        let embedder = embedder(Arc::new(HashingClient::new(8)), 8, 64);
        let error = embedder.embed("--- ... ***").await.unwrap_err();
        assert!(matches!(error, EmbeddingError::EmptyText));
    }

    #[tokio::test]
    async fn embed_each_keeps_one_unit_vector_per_text() {
        let embedder = embedder(Arc::new(HashingClient::new(64)), 64, 64);
        let texts = vec![
            "device description".to_string(),
            "***".to_string(),
            "shelf life".to_string(),
        ];
        let vectors = embedder.embed_each(&texts).await.expect("vectors");
        assert_eq!(vectors.len(), 3);
        let norm = |v: &Vec<f32>| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm(&vectors[0]) - 1.0).abs() < 1e-5);
        assert_eq!(norm(&vectors[1]), 0.0);
        assert!((norm(&vectors[2]) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let embedder = Embedder::new(
            Arc::new(SlowClient),
            EmbeddingProvider::Hashing,
            "test-model",
            1,
            Some(64),
            Duration::from_millis(50),
        );
        let error = embedder.embed("text").await.unwrap_err();
        assert!(matches!(error, EmbeddingError::Timeout(_)));
    }

    #[tokio::test]
    async fn hashing_embedder_matches_configured_dimension() {
        let embedder = embedder(Arc::new(HashingClient::new(384)), 384, 2048);
        let vector = embedder
            .embed("The catheter is intended for peripheral vascular access.")
            .await
            .expect("vector");
        assert_eq!(vector.values.len(), 384);
        let norm: f32 = vector.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
