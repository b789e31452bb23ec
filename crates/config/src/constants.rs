//! Centralized constants for the QA pipeline
//!
//! Single source of truth for default tuning values referenced from the
//! `Default` impls in `settings.rs` and from component-local config
//! structs. Operational endpoints come from env vars with fallbacks.

/// Service endpoints (loaded from env vars with fallback defaults)
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// Model runtime endpoint for embedding and generation (env: MODEL_RUNTIME_URL)
    pub static MODEL_RUNTIME_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("MODEL_RUNTIME_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
    });

    /// Qdrant vector index endpoint (env: QDRANT_URL)
    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
    });
}

/// Retrieval tuning
pub mod retrieval {
    /// Passages returned per query
    pub const DEFAULT_TOP_K: usize = 7;

    /// Coarse similarity floor applied before reranking
    pub const MIN_RETRIEVAL_SCORE: f32 = 0.1;

    /// Final-score threshold applied after reranking
    pub const MIN_FINAL_SCORE: f32 = 0.3;

    /// Weight of the raw retrieval score in the final blend
    pub const RETRIEVAL_WEIGHT: f32 = 0.3;

    /// Weight of the rerank score in the final blend
    pub const RERANK_WEIGHT: f32 = 0.7;

    /// Initial candidate pool floor before reranking
    pub const INITIAL_POOL_FLOOR: usize = 20;

    /// Initial candidate pool multiplier over top_k
    pub const INITIAL_POOL_FACTOR: usize = 4;
}

/// Candidate generation tuning
pub mod generation {
    /// Best-of-N width
    pub const DEFAULT_N_CANDIDATES: usize = 5;

    /// Per-request cap on concurrent candidate generations
    pub const CANDIDATE_CONCURRENCY: usize = 4;

    /// Target answer length used by the length score
    pub const TARGET_TOKENS: usize = 200;

    /// Context token budget when assembling passages into a prompt
    pub const CONTEXT_TOKEN_BUDGET: usize = 1_800;

    /// Max tokens requested per sample
    pub const MAX_SAMPLE_TOKENS: usize = 512;
}

/// Confidence gate and merge weights
pub mod fusion {
    /// Local confidence at or above this skips the external agent
    pub const THETA_LOCAL: f32 = 0.75;

    /// Retrieval top-1 final score below this starts the external agent
    /// eagerly, in parallel with generation
    pub const PRE_GATE_FLOOR: f32 = 0.35;

    /// Weight of the local answer in fused confidence
    pub const ALPHA: f32 = 0.6;

    /// Weight of the external answer in fused confidence
    pub const BETA: f32 = 0.4;

    /// Similarity above this merges as reinforcing
    pub const REINFORCING_SIMILARITY: f32 = 0.8;

    /// Similarity above this (and below reinforcing) merges as complementary
    pub const COMPLEMENTARY_SIMILARITY: f32 = 0.5;

    /// Coherence proxy: admissible answer length range in tokens
    pub const COHERENCE_MIN_TOKENS: usize = 50;
    pub const COHERENCE_MAX_TOKENS: usize = 1_500;
}

/// Cache tuning
pub mod cache {
    /// Entry time-to-live
    pub const DEFAULT_TTL_SECONDS: u64 = 3_600;
}

/// Stage deadlines (milliseconds)
pub mod deadlines {
    pub const RETRIEVE_MS: u64 = 2_000;
    pub const GENERATE_MS: u64 = 15_000;
    pub const EXTERNAL_MS: u64 = 10_000;
    pub const TOTAL_MS: u64 = 30_000;
}
