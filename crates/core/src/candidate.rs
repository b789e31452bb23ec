//! Generation candidates and sampling parameters

use serde::{Deserialize, Serialize};

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 512,
        }
    }
}

/// One of the N answer drafts produced for a query/context pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationCandidate {
    /// Sampling profile tag (e.g. "precise", "balanced")
    pub profile: String,
    /// Draft answer text
    pub text: String,
    /// Self-reported confidence in [0, 1]
    pub self_confidence: f32,
    /// Perplexity proxy, >= 1; lower is better
    pub perplexity_proxy: f32,
    /// Token count of the draft
    pub tokens: usize,
    /// Parameters the draft was sampled with
    pub params: SamplingParams,
    /// Set when this is the structured "insufficient information" draft
    /// emitted because the runtime was unavailable
    pub fallback: bool,
}

impl GenerationCandidate {
    /// Likelihood term of the composite score: `1 / perplexity_proxy`
    pub fn perplexity_score(&self) -> f32 {
        if self.perplexity_proxy > 0.0 {
            (1.0 / self.perplexity_proxy).min(1.0)
        } else {
            0.0
        }
    }
}
