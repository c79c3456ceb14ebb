//! Embedding provider abstraction and implementations.
//!
//! The embedding model is an injected capability: the search engine only
//! sees the [`Embedder`] trait, so tests run against deterministic offline
//! providers instead of live APIs. Implementations:
//!
//! - [`DisabledEmbedder`]: always fails; used when embeddings are not
//!   configured and the engine should run keyword-only.
//! - [`HashEmbedder`]: deterministic bag-of-words hashing, no network.
//! - [`OpenAiEmbedder`]: calls an OpenAI-compatible embeddings endpoint
//!   with retry and exponential backoff.
//!
//! Also home to [`cosine_similarity`], shared by the vector index.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// An opaque function from text to a fixed-length vector.
///
/// `dims()` is fixed per instance; the engine validates it on every index
/// call. `embed` is issued with a timeout by callers, so implementations do
/// not need their own watchdog (the HTTP provider still sets a client
/// timeout to bound a single attempt).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`, `"hash-v1"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed one text. Failures map to [`Error::EmbeddingUnavailable`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Create the appropriate [`Embedder`] from configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "hash" => Ok(Box::new(HashEmbedder::new(config.dims.unwrap_or(64)))),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => Err(Error::Config(format!(
            "unknown embedding provider: '{other}'"
        ))),
    }
}

// ============ Disabled provider ============

/// A no-op provider that always returns [`Error::EmbeddingUnavailable`].
///
/// With `retrieval.keyword_fallback = true` the engine degrades to
/// keyword-only search; otherwise queries fail closed.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::EmbeddingUnavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Hash provider ============

/// Deterministic offline embedder: hashed bag-of-words, L2-normalized.
///
/// Texts sharing vocabulary land near each other, which is enough for the
/// demo pipeline and for tests that need stable vectors without a model.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

/// FNV-1a, so vectors are stable across builds and platforms (the std
/// hasher makes no such guarantee).
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-v1"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in crate::index::tokenize(text) {
            let bucket = (fnv1a(&token) % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

// ============ OpenAI-compatible provider ============

/// Embedding provider for OpenAI-compatible `POST {api_base}/embeddings`
/// endpoints. Requires the `OPENAI_API_KEY` environment variable.
///
/// Retry strategy:
/// - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ... capped at 2^5)
/// - HTTP 4xx (not 429) → fail immediately
/// - Network errors → retry
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_base: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config("embedding.model required for openai provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| Error::Config("embedding.dims required for openai provider".into()))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Config(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            model,
            dims,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::EmbeddingUnavailable("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/embeddings", self.api_base))
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;
                        return parse_embedding_response(&json)
                            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()));
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::EmbeddingUnavailable(format!(
                            "embeddings API error {status}: {text}"
                        )));
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::EmbeddingUnavailable(format!(
                        "embeddings API error {status}: {text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::EmbeddingUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::EmbeddingUnavailable("embedding failed after retries".to_string())
        }))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(text).await
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &serde_json::Value) -> AnyResult<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Vector math ============

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty or mismatched-length
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
