//! Core types and traits for the QA pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Collaborator traits for pluggable backends (embedder, index, reranker,
//!   generator runtime, external knowledge agent)
//! - The request/answer data model (queries, passages, candidates, merges)
//! - Stage outcome and error types
//! - Text utilities shared by scoring, grounding and merging

pub mod answer;
pub mod candidate;
pub mod error;
pub mod outcome;
pub mod passage;
pub mod query;
pub mod text;
pub mod traits;

pub use answer::{ExternalAnswer, LocalAnswer, MergeResult, MergeStrategy, SourceRef};
pub use candidate::{GenerationCandidate, SamplingParams};
pub use error::{Error, FailureKind, Result};
pub use outcome::{DegradeReason, StageOutcome};
pub use passage::Passage;
pub use query::Query;
pub use traits::{
    ChunkHit, Embedder, ExternalAgent, GeneratorRuntime, Reranker, SampleOutput, VectorIndex,
};
