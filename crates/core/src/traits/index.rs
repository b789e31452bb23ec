//! Vector index interface

use std::collections::HashMap;

use async_trait::async_trait;

use crate::Result;

/// A nearest-neighbor hit from the index
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// Index-level chunk id
    pub chunk_id: String,
    /// Inner-product similarity
    pub score: f32,
    /// Chunk text
    pub content: String,
    /// Stable source document id
    pub source_id: String,
    /// Chunk position within the source
    pub chunk_index: u32,
    /// Remaining chunk metadata
    pub metadata: HashMap<String, String>,
}

/// Dense similarity index over document chunks
///
/// Scores are inner products on unit-normalized vectors. The index and
/// its storage are owned elsewhere; the pipeline only reads.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-k nearest chunks, optionally scoped to one source document
    async fn search(&self, vector: &[f32], k: usize, scope: Option<&str>)
        -> Result<Vec<ChunkHit>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
