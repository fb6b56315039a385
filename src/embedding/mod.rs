//! Embedding backends.
//!
//! Implements the core [`Embedder`] trait for three backends:
//! - **[`OllamaEmbedder`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAIEmbedder`]** — calls the OpenAI embeddings API.
//! - **[`LocalEmbedder`]** — runs a fastembed model in-process; no network
//!   calls after the model download.
//!
//! All backends send texts in batches of `embedding.batch_size`. Any
//! failure is reported as [`BenchError::EmbeddingUnavailable`], which
//! aborts the run.
//!
//! # Retry Strategy
//!
//! The HTTP backends retry transient errors (429, 5xx, timeouts,
//! connection errors) with exponential backoff: 1s, 2s, 4s, ...

use anyhow::{bail, Result};
use async_trait::async_trait;
use context_bench_core::error::BenchError;
use context_bench_core::retry::RetryPolicy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::http::{client_with_timeout, post_json};
use crate::retry::call_with_retry;

pub use context_bench_core::embedding::*;

const EMBED_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

fn embed_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: EMBED_MAX_ATTEMPTS,
        base_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
    }
}

/// POST one batch and parse it with `parse`, retrying transient failures.
async fn embed_batch_http(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &serde_json::Value,
    label: &str,
    parse: fn(&serde_json::Value) -> std::result::Result<Vec<Vec<f32>>, String>,
) -> context_bench_core::Result<Vec<Vec<f32>>> {
    let json = call_with_retry(&embed_retry_policy(), label, |_| {
        post_json(client, url, headers, body)
    })
    .await
    .map_err(|e| {
        BenchError::EmbeddingUnavailable(format!(
            "{} failed after {} attempt(s): {}",
            label, e.attempts, e.last_error
        ))
    })?;
    parse(&json).map_err(BenchError::EmbeddingUnavailable)
}

fn parse_vector(value: &serde_json::Value) -> std::result::Result<Vec<f32>, String> {
    value
        .as_array()
        .ok_or_else(|| "embedding is not an array".to_string())?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| "embedding value is not a number".to_string())
        })
        .collect()
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: Client,
    model: String,
    url: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Ok(Self {
            client: client_with_timeout(Duration::from_secs(config.timeout_secs))?,
            model,
            url: url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> context_bench_core::Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.url);
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({ "model": self.model, "input": batch });
            let vectors =
                embed_batch_http(&self.client, &url, &[], &body, "ollama embed", parse_ollama_response)
                    .await?;
            ensure_batch_len(&vectors, batch.len())?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> std::result::Result<Vec<Vec<f32>>, String> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| "Invalid Ollama response: missing embeddings array".to_string())?
        .iter()
        .map(parse_vector)
        .collect()
}

// ============ OpenAI ============

/// Embedder using the OpenAI API. Requires `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    client: Client,
    model: String,
    api_key: String,
    batch_size: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: client_with_timeout(Duration::from_secs(config.timeout_secs))?,
            model,
            api_key,
            batch_size: config.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> context_bench_core::Result<Vec<Vec<f32>>> {
        let auth = format!("Bearer {}", self.api_key);
        let headers = [("Authorization", auth.as_str())];
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({ "model": self.model, "input": batch });
            let vectors = embed_batch_http(
                &self.client,
                "https://api.openai.com/v1/embeddings",
                &headers,
                &body,
                "openai embed",
                parse_openai_response,
            )
            .await?;
            ensure_batch_len(&vectors, batch.len())?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Extracts `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> std::result::Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| "Invalid OpenAI response: missing data array".to_string())?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| "Invalid OpenAI response: missing embedding".to_string())?;
        indexed.push((index, parse_vector(embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Local (fastembed) ============

/// In-process embedder backed by fastembed.
///
/// The model is loaded on the first `embed` call and reused for the
/// lifetime of the embedder. Inference runs on the blocking pool.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    batch_size: usize,
    model: tokio::sync::OnceCell<Arc<std::sync::Mutex<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        // Fail on unknown names now rather than mid-run.
        config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            batch_size: config.batch_size.max(1),
            model: tokio::sync::OnceCell::new(),
        })
    }

    async fn loaded_model(
        &self,
    ) -> context_bench_core::Result<Arc<std::sync::Mutex<fastembed::TextEmbedding>>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let name = self.model_name.clone();
                tracing::info!("Loading local embedding model {}", name);
                tokio::task::spawn_blocking(move || {
                    let which = config_to_fastembed_model(&name)
                        .map_err(|e| BenchError::EmbeddingUnavailable(e.to_string()))?;
                    fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(which).with_show_download_progress(true),
                    )
                    .map(|m| Arc::new(std::sync::Mutex::new(m)))
                    .map_err(|e| {
                        BenchError::EmbeddingUnavailable(format!(
                            "Failed to initialize local embedding model: {}",
                            e
                        ))
                    })
                })
                .await
                .map_err(|e| BenchError::EmbeddingUnavailable(e.to_string()))?
            })
            .await?;
        Ok(Arc::clone(model))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> context_bench_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.loaded_model().await?;
        let batch_size = self.batch_size;
        let owned = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = model.lock().map_err(|_| {
                BenchError::EmbeddingUnavailable("local embedding model lock poisoned".to_string())
            })?;
            guard
                .embed(owned, Some(batch_size))
                .map_err(|e| BenchError::EmbeddingUnavailable(format!("Local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| BenchError::EmbeddingUnavailable(e.to_string()))??;
        ensure_batch_len(&vectors, texts.len())?;
        Ok(vectors)
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5",
            other
        ),
    }
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (needs the `local-embeddings-fastembed` feature) |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
