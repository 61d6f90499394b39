use crate::cache::EmbeddingCache;
use crate::error::{Result, RiskchainError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Request structure for the embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Rate limits and server errors are worth retrying; everything else is not.
fn is_retryable(err: &RiskchainError) -> bool {
    let message = err.to_string();
    ["429", "500", "502", "503", "504", "Network error"]
        .iter()
        .any(|code| message.contains(code))
}

/// OpenAI-compatible embeddings client for risk descriptions.
///
/// Retries rate-limit and 5xx responses with exponential backoff and keeps
/// an optional LRU of recent query embeddings.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: Option<usize>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RiskchainError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            dimensions: None,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Request vectors of this size and reject responses of any other size.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Point at another OpenAI-compatible endpoint (no trailing slash).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| RiskchainError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(RiskchainError::Embedding(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RiskchainError::Embedding(format!("Failed to parse response: {}", e)))?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RiskchainError::Embedding("Empty response from embedding API".to_string()))?;

        if let Some(expected) = self.dimensions {
            if embedding.len() != expected {
                return Err(RiskchainError::DimensionMismatch {
                    expected,
                    got: embedding.len(),
                });
            }
        }
        Ok(embedding)
    }

    /// Embed a query text, consulting the cache first.
    pub async fn embed_query(&self, text: &str, max_retries: usize) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RiskchainError::InvalidInput("query_text is empty".to_string()));
        }

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Embedding cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_millis(500);
        let embedding = loop {
            match self.request(text).await {
                Ok(embedding) => break embedding,
                Err(e) if attempt < max_retries && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };
        log::debug!("Embedding API call took {:?} (attempt {})", start.elapsed(), attempt + 1);

        if let Some(cache) = &self.cache {
            cache.put(text, embedding.clone());
        }
        Ok(embedding)
    }
}
