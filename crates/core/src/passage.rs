//! Retrieved passage type

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A document chunk returned by retrieval
///
/// Produced once by the retriever and shared immutably with every
/// downstream stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Stable source document identifier
    pub source_id: String,
    /// Chunk position within the source
    pub chunk_index: u32,
    /// Chunk text, never empty
    pub content: String,
    /// Free-form source metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Raw similarity from the vector index
    pub retrieval_score: f32,
    /// Cross-encoder (or lexical fallback) score
    pub rerank_score: f32,
    /// Final blended score in [0, 1]
    pub score: f32,
}

impl Passage {
    pub fn new(
        source_id: impl Into<String>,
        chunk_index: u32,
        content: impl Into<String>,
        retrieval_score: f32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            chunk_index,
            content: content.into(),
            metadata: HashMap::new(),
            retrieval_score,
            rerank_score: 0.0,
            score: retrieval_score,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Deterministic ordering: final score descending, then source id,
    /// then chunk index
    pub fn cmp_ranked(a: &Passage, b: &Passage) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    }
}
