//! Cross-encoder reranking and the lexical fallback scorer

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::text;
use docqa_core::{Error, Reranker, Result};

/// HTTP cross-encoder configuration
#[derive(Debug, Clone)]
pub struct HttpCrossEncoderConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for HttpCrossEncoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "bge-reranker-base".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

/// Reranker backed by a cross-encoder serving endpoint
pub struct HttpCrossEncoder {
    client: Client,
    config: HttpCrossEncoderConfig,
}

impl HttpCrossEncoder {
    pub fn new(config: HttpCrossEncoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::upstream("reranker", format!("client init: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Reranker for HttpCrossEncoder {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: &self.config.model,
            query,
            documents: passages,
        };

        let url = format!("{}/api/rerank", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream("reranker", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                "reranker",
                format!("{} - {}", status, body),
            ));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream("reranker", format!("invalid response: {}", e)))?;

        if parsed.scores.len() != passages.len() {
            return Err(Error::upstream(
                "reranker",
                format!(
                    "score count mismatch: {} passages, {} scores",
                    passages.len(),
                    parsed.scores.len()
                ),
            ));
        }

        Ok(parsed.scores)
    }

    fn name(&self) -> &str {
        "cross_encoder"
    }
}

/// Lexical relevance scorer used when no cross-encoder is available
///
/// Token-set Jaccard on content tokens plus an exact-phrase bonus,
/// clamped to [0, 1].
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn score(query: &str, passage: &str) -> f32 {
        let query_tokens = text::content_token_set(query);
        let passage_tokens = text::content_token_set(passage);
        let overlap = text::jaccard(&query_tokens, &passage_tokens);
        (overlap + text::phrase_bonus(query, passage)).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_scorer_prefers_overlap() {
        let query = "transaction isolation levels";
        let relevant = LexicalScorer::score(query, "Transactions run at one of four isolation levels");
        let irrelevant = LexicalScorer::score(query, "The weather forecast calls for rain today");
        assert!(relevant > irrelevant);
        assert!(relevant > 0.0);
        assert_eq!(irrelevant, 0.0);
    }

    #[test]
    fn test_lexical_scorer_phrase_bonus() {
        let with_phrase = LexicalScorer::score("binary search", "binary search halves the range");
        let without = LexicalScorer::score("binary search", "searching uses a binary split");
        assert!(with_phrase > without);
    }

    #[test]
    fn test_lexical_scorer_bounded() {
        let score = LexicalScorer::score("hash tables", "hash tables hash tables hash tables");
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_config_default() {
        let config = HttpCrossEncoderConfig::default();
        assert_eq!(config.model, "bge-reranker-base");
    }
}
