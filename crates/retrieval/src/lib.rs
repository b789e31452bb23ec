//! Retrieval subsystem
//!
//! Composes the embedding service, the vector index and the reranker into
//! a single `Retriever` owning relevance thresholds and final passage
//! selection. When the cross-encoder is unavailable the retriever falls
//! back to lexical overlap scoring and flags the outcome as degraded.

pub mod embeddings;
pub mod index;
pub mod reranker;
pub mod retriever;

pub use embeddings::{HashEmbedder, HttpEmbedder, HttpEmbedderConfig};
pub use index::{MemoryIndex, QdrantIndex, QdrantIndexConfig};
pub use reranker::{HttpCrossEncoder, HttpCrossEncoderConfig, LexicalScorer};
pub use retriever::{RerankMode, Retrieval, Retriever, RetrieverConfig};
