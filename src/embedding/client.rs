use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

use super::{check_embeddings, ScoreProvider};
use crate::error::EmbeddingError;

/// Configuration for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Full URL of the embeddings route
    pub api_url: String,
    /// Bearer token, if the server wants one
    pub api_key: Option<String>,
    /// Model name sent with every request
    pub model: String,
}

impl EmbeddingConfig {
    /// Create config from environment variables
    ///
    /// `EMBEDDING_API_URL` is required; `EMBEDDING_API_KEY` and `EMBEDDING_MODEL` are
    /// optional.
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("EMBEDDING_API_URL")
            .context("EMBEDDING_API_URL environment variable not set")?;

        Ok(Self {
            api_url,
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            model: std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "LaBSE".to_string()),
        })
    }

    /// Create with custom settings
    pub fn new(api_url: String, model: String) -> Self {
        Self {
            api_url,
            api_key: None,
            model,
        }
    }
}

/// Score provider backed by a remote embeddings server
///
/// The alignment engine is synchronous, so `encode` drives the async client through the
/// runtime handle captured at construction. Call it from a blocking worker
/// (`tokio::task::spawn_blocking`), never from inside an async task.
pub struct HttpEncoder {
    client: Client,
    config: EmbeddingConfig,
    handle: Handle,
}

impl HttpEncoder {
    /// Must be called from within a tokio runtime
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            handle: Handle::current(),
        }
    }

    pub fn with_handle(config: EmbeddingConfig, handle: Handle) -> Self {
        Self {
            client: Client::new(),
            config,
            handle,
        }
    }

    /// Send one batch to the server
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut builder = self
            .client
            .post(&self.config.api_url)
            .header("content-type", "application/json")
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(EmbeddingError::request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::request(format!(
                "embeddings API error: {} - {}",
                status, body
            )));
        }

        let mut response: EmbeddingResponse =
            response.json().await.map_err(EmbeddingError::request)?;

        // Servers may answer out of order; `index` is authoritative
        response.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        check_embeddings(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

impl ScoreProvider for HttpEncoder {
    fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            debug!("Encoding batch of {} texts with {}", chunk.len(), self.config.model);
            out.extend(self.handle.block_on(self.embed_batch(chunk))?);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
