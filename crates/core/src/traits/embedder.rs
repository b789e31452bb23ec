//! Embedding service interface

use async_trait::async_trait;

use crate::Result;

/// Maps text to a fixed-dimension unit vector
///
/// Implementations must return L2-normalized vectors of `dim()` length;
/// the dimension is fixed at startup. Embedding failure is fatal to the
/// request that needed it.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Vector dimension
    fn dim(&self) -> usize;

    /// Backend name for logging
    fn name(&self) -> &str;
}
