//! Collaborator traits
//!
//! One capability interface per external collaborator, selected at
//! startup from configuration. Degraded capability is expressed by a
//! concrete null implementation, never by runtime probing.

mod embedder;
mod external;
mod generator;
mod index;
mod reranker;

pub use embedder::Embedder;
pub use external::ExternalAgent;
pub use generator::{GeneratorRuntime, SampleOutput};
pub use index::{ChunkHit, VectorIndex};
pub use reranker::Reranker;
