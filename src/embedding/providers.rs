//! Embedding backends: in-process feature hashing, Ollama and OpenAI.

use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deterministic offline embedding client based on hashed word features.
///
/// Each lowercase word and adjacent word pair is hashed into one of `dimension` buckets with a
/// hash-derived sign, and the resulting vector is L2-normalized.
pub struct HashingClient {
    dimension: usize,
}

impl HashingClient {
    /// Construct a new hashing client producing `dimension`-length vectors.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        let tokens = crate::text::word_tokens(text);
        if tokens.is_empty() {
            return embedding;
        }

        let mut add_feature = |feature: &str, weight: f32| {
            let hash = fnv1a(feature.as_bytes());
            let position = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            embedding[position] += sign * weight;
        };

        for token in &tokens {
            add_feature(token, 1.0);
        }
        for pair in tokens.windows(2) {
            add_feature(&format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

#[async_trait]
impl EmbeddingClient for HashingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }

    fn provider_name(&self) -> &'static str {
        "hashing"
    }
}

/// Embedding client for a local Ollama runtime (`POST /api/embed`).
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    /// Build a client for `model` served at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("fda-pipeline/embed")
            .timeout(timeout)
            .build()
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: &texts,
            })
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404 (is model '{}' pulled?)",
                self.endpoint(),
                self.model
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;
        ensure_count(body.embeddings, texts.len())
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

/// Embedding client for the OpenAI embeddings API (`POST /embeddings`).
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: Option<usize>,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client for `model`. `dimensions` is forwarded for models that support shortening.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("fda-pipeline/embed")
            .timeout(timeout)
            .build()
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let dimensions = self
            .dimensions
            .filter(|_| self.model.starts_with("text-embedding-3"));
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbedRequest {
                model: &self.model,
                input: &texts,
                dimensions,
            })
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = format!("OpenAI embeddings returned {status}: {body}");
            return Err(
                if status == StatusCode::UNAUTHORIZED || status.is_server_error() {
                    EmbeddingClientError::ProviderUnavailable(error)
                } else {
                    EmbeddingClientError::GenerationFailed(error)
                },
            );
        }

        let mut body: OpenAiEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode OpenAI response: {error}"
            ))
        })?;
        body.data.sort_by_key(|entry| entry.index);
        ensure_count(
            body.data.into_iter().map(|entry| entry.embedding).collect(),
            texts.len(),
        )
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn ensure_count(
    embeddings: Vec<Vec<f32>>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if embeddings.len() != expected {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "provider returned {} embeddings for {expected} inputs",
            embeddings.len()
        )));
    }
    Ok(embeddings)
}
