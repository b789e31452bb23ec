//! Best-of-N candidate generator
//!
//! Fans the fixed sampling profiles out against the runtime under a
//! per-request concurrency cap and a stage deadline. Partial completions
//! are used when at least one candidate finished; a runtime outage yields
//! a single structured fallback candidate.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};

use docqa_core::text;
use docqa_core::{
    DegradeReason, Error, GenerationCandidate, GeneratorRuntime, Passage, Query, SampleOutput,
    SamplingParams, StageOutcome,
};

use crate::context::build_context;
use crate::profiles::{profiles_for, SamplingProfile};
use docqa_config::constants::generation as tuning;

/// Structured draft emitted when the runtime is unavailable
pub const INSUFFICIENT_INFO_TEXT: &str = "Insufficient information: the answer generator is \
     unavailable and no grounded answer could be produced for this question.";

/// Candidate generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Best-of-N width
    pub n_candidates: usize,
    /// Per-request concurrency cap
    pub concurrency: usize,
    /// Max tokens per sample
    pub max_tokens: usize,
    /// Token budget for assembled context
    pub context_token_budget: usize,
    /// Target answer length for confidence heuristics
    pub target_tokens: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_candidates: tuning::DEFAULT_N_CANDIDATES,
            concurrency: tuning::CANDIDATE_CONCURRENCY,
            max_tokens: tuning::MAX_SAMPLE_TOKENS,
            context_token_budget: tuning::CONTEXT_TOKEN_BUDGET,
            target_tokens: tuning::TARGET_TOKENS,
        }
    }
}

impl From<&docqa_config::Settings> for GeneratorConfig {
    fn from(settings: &docqa_config::Settings) -> Self {
        Self {
            n_candidates: settings.generation.n_candidates,
            concurrency: settings.generation.concurrency,
            max_tokens: settings.generation.max_tokens,
            context_token_budget: settings.generation.context_token_budget,
            target_tokens: settings.generation.target_tokens,
        }
    }
}

/// Best-of-N generator over a shared runtime
pub struct CandidateGenerator {
    runtime: Arc<dyn GeneratorRuntime>,
    config: GeneratorConfig,
}

impl CandidateGenerator {
    pub fn new(runtime: Arc<dyn GeneratorRuntime>, config: GeneratorConfig) -> Self {
        Self { runtime, config }
    }

    /// Generate up to N candidates within `deadline`
    ///
    /// Candidates come back sorted by profile tag so downstream ranking is
    /// reproducible.
    pub async fn generate(
        &self,
        query: &Query,
        passages: &[Passage],
        deadline: Duration,
    ) -> StageOutcome<Vec<GenerationCandidate>> {
        let context = build_context(passages, self.config.context_token_budget);
        let profiles = profiles_for(self.config.n_candidates);
        let requested = profiles.len();
        let deadline_at = Instant::now() + deadline;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.min(requested).max(1)));
        let mut tasks: JoinSet<std::result::Result<GenerationCandidate, TaskFailure>> =
            JoinSet::new();

        for profile in profiles {
            let runtime = Arc::clone(&self.runtime);
            let semaphore = Arc::clone(&semaphore);
            let prompt = profile.prompt(&query.normalized, &context);
            let params = profile.params(self.config.max_tokens);
            let profile = *profile;
            let target_tokens = self.config.target_tokens;

            tasks.spawn(async move {
                // The deadline covers the permit wait as well as the call
                let work = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| Error::Internal("candidate semaphore closed".into()))?;
                    runtime.sample(&prompt, &params).await
                };

                match tokio::time::timeout_at(deadline_at, work).await {
                    Ok(Ok(output)) => Ok(to_candidate(&profile, output, params, target_tokens)),
                    Ok(Err(e)) => {
                        tracing::warn!(profile = profile.tag, error = %e, "candidate failed");
                        Err(TaskFailure::Upstream)
                    },
                    Err(_) => {
                        tracing::debug!(profile = profile.tag, "candidate cancelled at deadline");
                        Err(TaskFailure::Timeout)
                    },
                }
            });
        }

        let mut candidates = Vec::with_capacity(requested);
        let mut timeouts = 0usize;
        let mut failures = 0usize;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(candidate)) => candidates.push(candidate),
                Ok(Err(TaskFailure::Timeout)) => timeouts += 1,
                Ok(Err(TaskFailure::Upstream)) => failures += 1,
                Err(e) => {
                    tracing::error!(error = %e, "candidate task panicked");
                    failures += 1;
                },
            }
        }

        candidates.sort_by(|a, b| a.profile.cmp(&b.profile));

        if candidates.len() == requested {
            return StageOutcome::Ok(candidates);
        }

        if !candidates.is_empty() {
            tracing::warn!(
                completed = candidates.len(),
                requested,
                timeouts,
                failures,
                "using partial candidate set"
            );
            return StageOutcome::degraded(candidates, DegradeReason::PartialCandidates);
        }

        // Nothing completed: an unreachable runtime degrades to the
        // structured fallback; pure deadline exhaustion fails the stage
        if failures > 0 {
            return StageOutcome::degraded(
                vec![fallback_candidate()],
                DegradeReason::GeneratorFallback,
            );
        }

        StageOutcome::Failed(Error::timeout("generate"))
    }
}

enum TaskFailure {
    Timeout,
    Upstream,
}

fn to_candidate(
    profile: &SamplingProfile,
    output: SampleOutput,
    params: SamplingParams,
    target_tokens: usize,
) -> GenerationCandidate {
    let cleaned = clean_formatting(&output.text);
    let tokens = if output.tokens > 0 {
        output.tokens
    } else {
        text::estimate_tokens(&cleaned)
    };

    let perplexity_proxy = match output.avg_log_likelihood {
        Some(avg_ll) => (-avg_ll).exp().max(1.0),
        None => length_perplexity(tokens, target_tokens),
    };
    let self_confidence = self_confidence(profile, tokens, target_tokens, output.avg_log_likelihood);

    GenerationCandidate {
        profile: profile.tag.to_string(),
        text: cleaned,
        self_confidence,
        perplexity_proxy,
        tokens,
        params,
        fallback: false,
    }
}

/// Length-normalized perplexity heuristic for runtimes that report no
/// likelihoods: answers far below the target length read as uncertain
fn length_perplexity(tokens: usize, target_tokens: usize) -> f32 {
    let ratio = (tokens as f32 / target_tokens.max(1) as f32).min(1.0);
    1.5 + (1.0 - ratio) * 1.5
}

/// Self-confidence consistent with the perplexity proxy: likelihood when
/// reported, else sampling temperature and answer length
fn self_confidence(
    profile: &SamplingProfile,
    tokens: usize,
    target_tokens: usize,
    avg_log_likelihood: Option<f32>,
) -> f32 {
    let base = match avg_log_likelihood {
        Some(avg_ll) => avg_ll.exp().clamp(0.0, 1.0),
        None => 0.5,
    };
    let temperature_term = (1.0 - profile.temperature.min(1.0)) * 0.3;
    let length_term = (tokens as f32 / target_tokens.max(1) as f32).min(1.0) * 0.2;
    (base * 0.5 + temperature_term + length_term).clamp(0.0, 1.0)
}

fn fallback_candidate() -> GenerationCandidate {
    GenerationCandidate {
        profile: "fallback".to_string(),
        text: INSUFFICIENT_INFO_TEXT.to_string(),
        self_confidence: 0.1,
        perplexity_proxy: 10.0,
        tokens: text::estimate_tokens(INSUFFICIENT_INFO_TEXT),
        params: SamplingParams {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 0,
        },
        fallback: true,
    }
}

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static TRAILING_LINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());

/// Normalize runtime output formatting
fn clean_formatting(raw: &str) -> String {
    let collapsed = EXCESS_BLANK_LINES.replace_all(raw, "\n\n");
    let trimmed = TRAILING_LINE_SPACE.replace_all(&collapsed, "\n");
    trimmed.trim().to_string()
}
