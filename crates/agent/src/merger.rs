//! Answer merger
//!
//! Fuses the local and external answers under a similarity-driven
//! strategy and fixed confidence weights, and computes the coherence
//! proxy recorded on every result.

use docqa_core::text;
use docqa_core::{
    Error, ExternalAnswer, LocalAnswer, MergeResult, MergeStrategy, Result, SourceRef,
};

use docqa_config::constants::fusion;

/// Merger configuration; the weights are fixed by design and validated
/// again at merge time
#[derive(Debug, Clone)]
pub struct MergerConfig {
    pub alpha: f32,
    pub beta: f32,
    pub reinforcing_similarity: f32,
    pub complementary_similarity: f32,
    pub coherence_min_tokens: usize,
    pub coherence_max_tokens: usize,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            alpha: fusion::ALPHA,
            beta: fusion::BETA,
            reinforcing_similarity: fusion::REINFORCING_SIMILARITY,
            complementary_similarity: fusion::COMPLEMENTARY_SIMILARITY,
            coherence_min_tokens: fusion::COHERENCE_MIN_TOKENS,
            coherence_max_tokens: fusion::COHERENCE_MAX_TOKENS,
        }
    }
}

impl From<&docqa_config::Settings> for MergerConfig {
    fn from(settings: &docqa_config::Settings) -> Self {
        Self {
            alpha: settings.merge.alpha,
            beta: settings.merge.beta,
            ..Default::default()
        }
    }
}

/// Local/external answer fusion
pub struct AnswerMerger {
    config: MergerConfig,
}

impl AnswerMerger {
    pub fn new(config: MergerConfig) -> Self {
        Self { config }
    }

    /// Merge a local and an external answer
    ///
    /// Provenance is stable: local passages in ranked order, then external
    /// sources in the agent's order.
    pub fn merge(&self, local: &LocalAnswer, external: &ExternalAnswer) -> Result<MergeResult> {
        // Weight-sum violation is a programmer error, never cached
        let weight_sum = self.config.alpha + self.config.beta;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(Error::Internal(format!(
                "merge weights must sum to 1.0, got {}",
                weight_sum
            )));
        }

        let local_tokens = text::content_token_set(&local.text);
        let external_tokens = text::content_token_set(&external.text);
        let similarity = text::jaccard(&local_tokens, &external_tokens);

        let (strategy, fused_text) = self.fuse(local, external, similarity);
        let confidence =
            (self.config.alpha * local.confidence + self.config.beta * external.confidence)
                .clamp(0.0, 1.0);
        let coherence = self.coherence(&fused_text);

        let mut provenance: Vec<SourceRef> = local
            .passages
            .iter()
            .map(|p| SourceRef::Local {
                source_id: p.source_id.clone(),
                chunk_index: p.chunk_index,
                score: p.score,
            })
            .collect();
        provenance.extend(external.sources.iter().map(|uri| SourceRef::External {
            uri: uri.clone(),
            score: external.confidence,
        }));

        tracing::debug!(
            strategy = strategy.as_str(),
            similarity,
            confidence,
            coherence,
            "answers merged"
        );

        Ok(MergeResult {
            text: fused_text,
            confidence,
            strategy: Some(strategy),
            similarity,
            coherence,
            provenance,
            annotations: Vec::new(),
        })
    }

    /// Wrap a local answer with no external contribution
    pub fn local_only(&self, local: &LocalAnswer) -> MergeResult {
        MergeResult::from_local(local, self.coherence(&local.text))
    }

    fn fuse(
        &self,
        local: &LocalAnswer,
        external: &ExternalAnswer,
        similarity: f32,
    ) -> (MergeStrategy, String) {
        let local_wins = local.confidence >= external.confidence;

        if similarity > self.config.reinforcing_similarity {
            let (winner, confirmation) = if local_wins {
                (
                    local.text.as_str(),
                    "External sources independently confirm this answer.",
                )
            } else {
                (
                    external.text.as_str(),
                    "Local corpus analysis independently confirms this answer.",
                )
            };
            return (
                MergeStrategy::Reinforcing,
                format!("{}\n\n{}", winner, confirmation),
            );
        }

        if similarity > self.config.complementary_similarity {
            let (winner, other) = if local_wins {
                (local.text.as_str(), external.text.as_str())
            } else {
                (external.text.as_str(), local.text.as_str())
            };
            return (
                MergeStrategy::Complementary,
                format!("{}\n\nAdditional context:\n{}", winner, other),
            );
        }

        (
            MergeStrategy::Conflicting,
            format!(
                "Local analysis:\n{}\n\nExternal perspective:\n{}",
                local.text, external.text
            ),
        )
    }

    /// Length-based coherence proxy: 1.0 inside the admissible token
    /// range, scaled linearly below it, clipped above
    pub fn coherence(&self, fused_text: &str) -> f32 {
        let tokens = text::estimate_tokens(fused_text);
        if tokens < self.config.coherence_min_tokens {
            tokens as f32 / self.config.coherence_min_tokens.max(1) as f32
        } else {
            1.0
        }
    }
}

impl Default for AnswerMerger {
    fn default() -> Self {
        Self::new(MergerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::Passage;

    fn local(text: &str, confidence: f32) -> LocalAnswer {
        LocalAnswer {
            text: text.to_string(),
            confidence,
            winning_profile: "precise".to_string(),
            passages: vec![Passage::new("kb.md", 0, "passage text", 0.8)],
            fallback: false,
        }
    }

    fn external(text: &str, confidence: f32) -> ExternalAnswer {
        ExternalAnswer::new(text, confidence, vec!["https://example.org/a".to_string()])
    }

    #[test]
    fn test_reinforcing_prefers_higher_confidence() {
        let merger = AnswerMerger::default();
        let shared = "hash tables store key value pairs in bucket arrays";
        let result = merger
            .merge(&local(shared, 0.9), &external(shared, 0.7))
            .unwrap();

        assert_eq!(result.strategy, Some(MergeStrategy::Reinforcing));
        assert!(result.text.starts_with(shared));
        assert!(result.text.contains("External sources independently confirm"));
        assert!((result.confidence - (0.6 * 0.9 + 0.4 * 0.7)).abs() < 1e-6);
    }

    #[test]
    fn test_complementary_appends_additional_context() {
        let merger = AnswerMerger::default();
        // Overlapping token sets with one unique term on each side
        let local_text = "hash tables store key value pairs collisions";
        let external_text = "hash tables store key value pairs probing";
        let result = merger
            .merge(&local(local_text, 0.6), &external(external_text, 0.8))
            .unwrap();

        assert_eq!(result.strategy, Some(MergeStrategy::Complementary));
        assert!(result.text.starts_with(external_text));
        assert!(result.text.contains("Additional context:"));
        assert!((result.confidence - (0.6 * 0.6 + 0.4 * 0.8)).abs() < 1e-6);
    }

    #[test]
    fn test_conflicting_keeps_both_sections() {
        let merger = AnswerMerger::default();
        let result = merger
            .merge(
                &local("completely different topic entirely", 0.5),
                &external("unrelated external narrative instead", 0.6),
            )
            .unwrap();

        assert_eq!(result.strategy, Some(MergeStrategy::Conflicting));
        assert!(result.text.contains("Local analysis:"));
        assert!(result.text.contains("External perspective:"));
    }

    #[test]
    fn test_provenance_orders_local_before_external() {
        let merger = AnswerMerger::default();
        let result = merger
            .merge(&local("some answer text", 0.5), &external("other text", 0.6))
            .unwrap();

        assert!(matches!(result.provenance[0], SourceRef::Local { .. }));
        assert!(matches!(result.provenance[1], SourceRef::External { .. }));
    }

    #[test]
    fn test_bad_weights_are_internal_error() {
        let merger = AnswerMerger::new(MergerConfig {
            alpha: 0.7,
            beta: 0.4,
            ..Default::default()
        });
        let err = merger
            .merge(&local("a", 0.5), &external("b", 0.5))
            .unwrap_err();
        assert_eq!(err.kind(), docqa_core::FailureKind::Internal);
    }

    #[test]
    fn test_coherence_scaling() {
        let merger = AnswerMerger::default();
        // Short answers scale linearly below the floor
        assert!(merger.coherence("short") < 1.0);
        let long = "token ".repeat(400);
        assert_eq!(merger.coherence(&long), 1.0);
    }

    #[test]
    fn test_similarity_boundaries() {
        let merger = AnswerMerger::default();
        let identical = "identical answer tokens everywhere";
        let result = merger
            .merge(&local(identical, 0.8), &external(identical, 0.8))
            .unwrap();
        assert_eq!(result.similarity, 1.0);
        assert_eq!(result.strategy, Some(MergeStrategy::Reinforcing));
    }
}
