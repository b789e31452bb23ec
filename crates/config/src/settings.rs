//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{cache, deadlines, endpoints, fusion, generation, retrieval};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding service
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index
    #[serde(default)]
    pub index: IndexConfig,

    /// Cross-encoder reranker
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Retrieval thresholds
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Candidate generation
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Confidence gate
    #[serde(default)]
    pub gate: GateConfig,

    /// Answer merge weights
    #[serde(default)]
    pub merge: MergeConfig,

    /// Answer cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// External knowledge agent
    #[serde(default)]
    pub external: ExternalConfig,

    /// Per-stage and total deadlines
    #[serde(default)]
    pub deadlines: DeadlineConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Admission queue bound; saturation returns a retryable 503
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins; empty defaults to localhost
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_concurrent() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "http" for a model runtime endpoint, "hash" for the deterministic
    /// in-process embedder (tests and development)
    #[serde(default = "default_http_provider")]
    pub provider: String,

    #[serde(default = "default_runtime_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embed_model")]
    pub model: String,

    /// Vector dimension, fixed at startup
    #[serde(default = "default_embed_dim")]
    pub dim: usize,
}

fn default_http_provider() -> String {
    "http".to_string()
}

fn default_runtime_endpoint() -> String {
    endpoints::MODEL_RUNTIME_DEFAULT.clone()
}

fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embed_dim() -> usize {
    768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_http_provider(),
            endpoint: default_runtime_endpoint(),
            model: default_embed_model(),
            dim: default_embed_dim(),
        }
    }
}

/// Vector index provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    #[default]
    Qdrant,
    Memory,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub provider: IndexProvider,

    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.clone()
}

fn default_collection() -> String {
    "document_chunks".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: IndexProvider::default(),
            endpoint: default_qdrant_endpoint(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// When false (or the endpoint is unreachable) the retriever uses the
    /// lexical fallback scorer
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_runtime_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_rerank_model")]
    pub model: String,
}

fn default_rerank_model() -> String {
    "bge-reranker-base".to_string()
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_runtime_endpoint(),
            model: default_rerank_model(),
        }
    }
}

/// Retrieval thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_retrieval_score")]
    pub min_retrieval_score: f32,

    #[serde(default = "default_min_final_score")]
    pub min_final_score: f32,
}

fn default_top_k() -> usize {
    retrieval::DEFAULT_TOP_K
}

fn default_min_retrieval_score() -> f32 {
    retrieval::MIN_RETRIEVAL_SCORE
}

fn default_min_final_score() -> f32 {
    retrieval::MIN_FINAL_SCORE
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_retrieval_score: default_min_retrieval_score(),
            min_final_score: default_min_final_score(),
        }
    }
}

/// Candidate generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "http" for a model runtime endpoint, "unavailable" for the null
    /// implementation
    #[serde(default = "default_http_provider")]
    pub provider: String,

    #[serde(default = "default_runtime_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_gen_model")]
    pub model: String,

    #[serde(default = "default_n_candidates")]
    pub n_candidates: usize,

    /// Per-request cap on concurrent candidate generations
    #[serde(default = "default_candidate_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_max_sample_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,

    #[serde(default = "default_context_budget")]
    pub context_token_budget: usize,
}

fn default_gen_model() -> String {
    "phi3:mini".to_string()
}

fn default_n_candidates() -> usize {
    generation::DEFAULT_N_CANDIDATES
}

fn default_candidate_concurrency() -> usize {
    generation::CANDIDATE_CONCURRENCY
}

fn default_max_sample_tokens() -> usize {
    generation::MAX_SAMPLE_TOKENS
}

fn default_target_tokens() -> usize {
    generation::TARGET_TOKENS
}

fn default_context_budget() -> usize {
    generation::CONTEXT_TOKEN_BUDGET
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_http_provider(),
            endpoint: default_runtime_endpoint(),
            model: default_gen_model(),
            n_candidates: default_n_candidates(),
            concurrency: default_candidate_concurrency(),
            max_tokens: default_max_sample_tokens(),
            target_tokens: default_target_tokens(),
            context_token_budget: default_context_budget(),
        }
    }
}

/// Confidence gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Local confidence at or above this skips the external agent
    #[serde(default = "default_theta_local")]
    pub theta_local: f32,

    /// Start the external agent eagerly when retrieval looks weak
    #[serde(default)]
    pub pre_gate_enabled: bool,

    /// Retrieval top-1 final score below this fires the pre-gate heuristic
    #[serde(default = "default_pre_gate_floor")]
    pub pre_gate_floor: f32,
}

fn default_theta_local() -> f32 {
    fusion::THETA_LOCAL
}

fn default_pre_gate_floor() -> f32 {
    fusion::PRE_GATE_FLOOR
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            theta_local: default_theta_local(),
            pre_gate_enabled: false,
            pre_gate_floor: default_pre_gate_floor(),
        }
    }
}

/// Merge weights; fixed by design, validated to sum to 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    #[serde(default = "default_beta")]
    pub beta: f32,
}

fn default_alpha() -> f32 {
    fusion::ALPHA
}

fn default_beta() -> f32 {
    fusion::BETA
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
        }
    }
}

/// Answer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

fn default_ttl() -> u64 {
    cache::DEFAULT_TTL_SECONDS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
        }
    }
}

/// External knowledge agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: None,
        }
    }
}

/// Per-stage and total deadlines in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    #[serde(default = "default_retrieve_ms")]
    pub retrieve_ms: u64,

    #[serde(default = "default_generate_ms")]
    pub generate_ms: u64,

    #[serde(default = "default_external_ms")]
    pub external_ms: u64,

    #[serde(default = "default_total_ms")]
    pub total_ms: u64,
}

fn default_retrieve_ms() -> u64 {
    deadlines::RETRIEVE_MS
}

fn default_generate_ms() -> u64 {
    deadlines::GENERATE_MS
}

fn default_external_ms() -> u64 {
    deadlines::EXTERNAL_MS
}

fn default_total_ms() -> u64 {
    deadlines::TOTAL_MS
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            retrieve_ms: default_retrieve_ms(),
            generate_ms: default_generate_ms(),
            external_ms: default_external_ms(),
            total_ms: default_total_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl Settings {
    /// Validate settings against pipeline invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_retrieval()?;
        self.validate_generation()?;
        self.validate_fusion()?;
        self.validate_server()?;
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        for (field, value) in [
            ("retrieval.min_retrieval_score", self.retrieval.min_retrieval_score),
            ("retrieval.min_final_score", self.retrieval.min_final_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if self.embedding.dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.dim".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_generation(&self) -> Result<(), ConfigError> {
        if self.generation.n_candidates == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.n_candidates".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.generation.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.concurrency".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_fusion(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.gate.theta_local) {
            return Err(ConfigError::InvalidValue {
                field: "gate.theta_local".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.gate.theta_local),
            });
        }

        let weight_sum = self.merge.alpha + self.merge.beta;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidValue {
                field: "merge.alpha/merge.beta".to_string(),
                message: format!("Weights must sum to 1.0, got {}", weight_sum),
            });
        }

        if self.gate.pre_gate_enabled && !self.external.enabled {
            tracing::warn!(
                "gate.pre_gate_enabled has no effect while external.enabled is false"
            );
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_concurrent_requests".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.external.enabled && self.external.endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "external.endpoint".to_string(),
                message: "Required when external.enabled is true".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("DOCQA")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.retrieval.top_k, 7);
        assert_eq!(settings.generation.n_candidates, 5);
        assert!((settings.gate.theta_local - 0.75).abs() < 1e-6);
        assert_eq!(settings.cache.ttl_seconds, 3600);
        assert_eq!(settings.deadlines.total_ms, 30_000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_merge_weights_must_sum_to_one() {
        let mut settings = Settings::default();
        settings.merge.alpha = 0.7;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field.contains("merge")));
    }

    #[test]
    fn test_external_requires_endpoint() {
        let mut settings = Settings::default();
        settings.external.enabled = true;
        assert!(settings.validate().is_err());

        settings.external.endpoint = "http://localhost:9000/answer".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 0;
        assert!(settings.validate().is_err());
    }
}
