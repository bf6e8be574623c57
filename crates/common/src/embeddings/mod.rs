//! Embedding service abstraction
//!
//! Provides:
//! - The `Embedder` capability trait (OpenAI and deterministic mock)
//! - `EmbeddingGateway`, which enforces order and dimension guarantees on
//!   whatever the capability returns

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
    batch_size: usize,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Make request with retry. Embedding is idempotent, so retrying is safe.
    /// Only transient failures are retried.
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            let start = Instant::now();

            let result = self.make_request(texts).await;
            metrics::record_embedding(
                start.elapsed().as_secs_f64(),
                &self.model,
                texts.len(),
                result.is_ok(),
            );

            match result {
                Ok(embeddings) => return Ok(embeddings),
                Err(backoff::Error::Permanent(e)) => return Err(e),
                Err(backoff::Error::Transient { err: e, .. }) => {
                    if attempts >= self.max_retries {
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!(
                                attempt = attempts,
                                max_retries = self.max_retries,
                                retry_in_ms = delay.as_millis() as u64,
                                error = %e,
                                "Embedding request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }

    async fn make_request(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, backoff::Error<AppError>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::transient(AppError::EmbeddingService {
                    message: format!("Request failed: {}", e),
                })
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let mut result: OpenAIResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::EmbeddingService {
                message: format!("Failed to parse response: {}", e),
            })
        })?;

        // The API reports each vector's input position; do not trust arrival order.
        result.data.sort_by_key(|e| e.index);
        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

/// Rate limits and server errors are worth retrying; other 4xx are not
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn api_error(status: StatusCode, body: &str) -> backoff::Error<AppError> {
    let err = AppError::EmbeddingService {
        message: format!("API error {}: {}", status, body),
    };
    if is_retryable(status) {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingService {
                message: "Empty response".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.request_with_retry(batch).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock embedder for offline runs and tests.
///
/// Vectors are derived from a SHA-256 of the text, so equal texts always
/// embed to equal vectors.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut counter: u32 = 0;

        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(counter.to_le_bytes());
            hasher.update(text.as_bytes());
            let digest = hasher.finalize();

            for byte in digest.iter() {
                if vector.len() == self.dimension {
                    break;
                }
                vector.push(*byte as f32 / 255.0 - 0.5);
            }
            counter += 1;
        }

        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "OpenAI API key required for embedding provider 'openai'".to_string(),
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(key, config)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

/// Embedding gateway used by the pipeline.
///
/// Guarantees one vector per input, in input order, each of the model's
/// dimension. Anything else is an `EmbeddingService` error; there are no
/// fallback vectors.
#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed a sequence of texts
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::EmbeddingService {
                message: format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    vectors.len()
                ),
            });
        }

        for vector in &vectors {
            self.check_dimension(vector)?;
        }

        debug!(count = vectors.len(), model = %self.model_name(), "Embedded texts");
        Ok(vectors)
    }

    /// Embed a single query text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed(text).await?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension() {
            return Err(AppError::EmbeddingService {
                message: format!(
                    "Dimension mismatch: expected {}, got {}",
                    self.dimension(),
                    vector.len()
                ),
            });
        }
        Ok(())
    }
}
