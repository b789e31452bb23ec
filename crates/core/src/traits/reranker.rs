//! Cross-encoder reranker interface

use async_trait::async_trait;

use crate::Result;

/// Scores (query, passage) pairs; larger is better
///
/// The whole candidate set is scored in one call so implementations may
/// batch freely. When no reranker is configured the retriever falls back
/// to lexical overlap scoring; callers never handle that fallback.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per passage, in input order
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
