//! Embedding backends
//!
//! `HttpEmbedder` talks to a model runtime's embedding API;
//! `HashEmbedder` is the deterministic in-process implementation used in
//! tests and development. Both return unit-normalized vectors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::{Embedder, Error, Result};

/// HTTP embedder configuration
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Model runtime endpoint
    pub endpoint: String,
    /// Embedding model name
    pub model: String,
    /// Vector dimension, fixed at startup
    pub dim: usize,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dim: 768,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by a model runtime's `/api/embed` endpoint
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::upstream("embedder", format!("client init: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let url = format!("{}/api/embed", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream("embedder", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                "embedder",
                format!("{} - {}", status, body),
            ));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream("embedder", format!("invalid response: {}", e)))?;

        let mut vector = parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("embedder", "no embedding returned"))?;

        if vector.len() != self.config.dim {
            return Err(Error::upstream(
                "embedder",
                format!(
                    "dimension mismatch: expected {}, got {}",
                    self.config.dim,
                    vector.len()
                ),
            ));
        }

        // Downstream similarity is inner product; vectors must be unit length
        normalize(&mut vector);
        Ok(vector)
    }

    fn dim(&self) -> usize {
        self.config.dim
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Deterministic hash-based embedder (no model required)
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % self.dim;
            vector[idx] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_is_unit_length() {
        let embedder = HashEmbedder::new(128);
        let vector = embedder.embed("hello world").await.unwrap();
        assert_eq!(vector.len(), 128);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("same input").await.unwrap();
        let b = embedder.embed("same input").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_default() {
        let config = HttpEmbedderConfig::default();
        assert_eq!(config.dim, 768);
    }
}
