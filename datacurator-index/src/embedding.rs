// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Embedding providers
//!
//! The ranker only needs `text -> vector` with a fixed dimensionality. The
//! default provider calls Google's `embedContent` REST endpoint; a caching
//! wrapper keeps repeated query embeddings off the network.

use crate::error::EmbeddingError;
use async_trait::async_trait;
use datacurator_core::EmbeddingConfig;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier, for logs
    fn model_name(&self) -> &str;
}

/// Google Generative Language embedding client
pub struct GoogleEmbeddingClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleEmbeddingClient {
    pub fn new(api_key: String, model: String) -> Result<Self, EmbeddingError> {
        let config = EmbeddingConfig {
            api_key: Some(api_key),
            model,
            ..Default::default()
        };
        Self::from_config(&config)
    }

    /// Build from configuration; fails when no API key is configured
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                EmbeddingError::Configuration(
                    "missing embedding API key (set GOOGLE_AI_API_KEY)".to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for GoogleEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": {
                "parts": [{ "text": text }]
            }
        });

        let response = self
            .client
            .post(format!("{}/models/{}:embedContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(EmbeddingError::RateLimitExceeded);
            }
            return Err(EmbeddingError::ApiError(format!("{}: {}", status, error_text)));
        }

        let response_data: serde_json::Value = response.json().await?;

        let values = response_data["embedding"]["values"]
            .as_array()
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding.values".to_string()))?;

        let embedding: Vec<f32> = values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect();

        if embedding.is_empty() || embedding.len() != values.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} numeric values, got {}",
                values.len(),
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Caches embeddings by normalized text
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache<String, Arc<Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            inner,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(inner: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::new(
            inner,
            config.query_cache_size,
            Duration::from_secs(config.query_cache_ttl_secs),
        )
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn cache_key(text: &str) -> String {
        text.trim().to_lowercase()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = Self::cache_key(text);

        if let Some(embedding) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(embedding.as_ref().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let embedding = self.inner.embed(text).await?;
        self.cache.insert(key, Arc::new(embedding.clone())).await;

        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
