//! Generator runtime interface

use async_trait::async_trait;

use crate::{Result, SamplingParams};

/// Raw output of one sampling call
#[derive(Debug, Clone)]
pub struct SampleOutput {
    pub text: String,
    /// Model-reported average log-likelihood, when available
    pub avg_log_likelihood: Option<f32>,
    /// Tokens generated
    pub tokens: usize,
}

/// Model runtime used for candidate generation
///
/// Must be safe for concurrent calls; adapters over single-threaded
/// runtimes serialize internally behind a bounded pool.
#[async_trait]
pub trait GeneratorRuntime: Send + Sync {
    /// Sample one completion for a prompt
    async fn sample(&self, prompt: &str, params: &SamplingParams) -> Result<SampleOutput>;

    /// Whether the runtime can currently serve requests
    async fn is_available(&self) -> bool;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
