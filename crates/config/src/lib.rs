//! Configuration management for the QA pipeline
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (`DOCQA_` prefix, `__` separator)
//!
//! Every section has serde defaults so a missing file still yields a
//! runnable configuration; `Settings::validate` rejects values that would
//! break pipeline invariants (merge weights in particular).

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, CacheConfig, DeadlineConfig, EmbeddingConfig, ExternalConfig, GateConfig,
    GenerationConfig, IndexConfig, IndexProvider, MergeConfig, ObservabilityConfig, RerankConfig,
    RetrievalConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
