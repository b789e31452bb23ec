//! Candidate ranker
//!
//! Scores each draft on a weighted composite of length-normalized
//! likelihood, answer length and self-confidence, adjusted by how well
//! the draft is grounded in the retrieved passages, then picks the
//! winner deterministically.

use std::cmp::Ordering;
use std::collections::HashSet;

use docqa_core::text;
use docqa_core::{Error, GenerationCandidate, LocalAnswer, Passage, Result};

use docqa_config::constants::generation as tuning;

/// Structured answer used when retrieval produced nothing to ground on
pub const INSUFFICIENT_LOCAL_TEXT: &str = "Insufficient local information: no relevant passages \
     were found in the document corpus for this question.";

const PERPLEXITY_WEIGHT: f32 = 0.4;
const LENGTH_WEIGHT: f32 = 0.3;
const CONFIDENCE_WEIGHT: f32 = 0.3;

/// Grounding below this halves the composite score
const GROUNDING_DEMOTION_FLOOR: f32 = 0.2;

/// Ranker configuration
#[derive(Debug, Clone)]
pub struct RankerConfig {
    /// Target answer length for the length score
    pub target_tokens: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            target_tokens: tuning::TARGET_TOKENS,
        }
    }
}

impl From<&docqa_config::Settings> for RankerConfig {
    fn from(settings: &docqa_config::Settings) -> Self {
        Self {
            target_tokens: settings.generation.target_tokens,
        }
    }
}

/// A candidate with its composite and grounding scores
#[derive(Debug, Clone)]
struct Scored {
    candidate: GenerationCandidate,
    grounding: f32,
    adjusted: f32,
}

/// Best-of-N selection
pub struct CandidateRanker {
    config: RankerConfig,
}

impl CandidateRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    /// Rank candidates and produce the local answer
    ///
    /// Candidates are sorted by profile tag before scoring so tie-breaks
    /// are reproducible. With an empty passage set the result is the
    /// structured "insufficient local information" answer at confidence
    /// zero; the confidence gate then routes to the external agent.
    pub fn rank(
        &self,
        mut candidates: Vec<GenerationCandidate>,
        passages: &[Passage],
    ) -> Result<LocalAnswer> {
        if candidates.is_empty() {
            return Err(Error::Internal("ranker requires at least one candidate".into()));
        }

        candidates.sort_by(|a, b| a.profile.cmp(&b.profile));

        let passage_tokens: HashSet<String> = passages
            .iter()
            .flat_map(|p| text::content_token_set(&p.content))
            .collect();

        let mut scored: Vec<Scored> = candidates
            .into_iter()
            .map(|candidate| self.score(candidate, &passage_tokens))
            .collect();
        scored.sort_by(compare);

        let winner = scored.into_iter().next().expect("non-empty candidate set");

        if passages.is_empty() {
            return Ok(LocalAnswer {
                text: INSUFFICIENT_LOCAL_TEXT.to_string(),
                confidence: 0.0,
                winning_profile: winner.candidate.profile,
                passages: Vec::new(),
                fallback: true,
            });
        }

        tracing::debug!(
            profile = %winner.candidate.profile,
            grounding = winner.grounding,
            score = winner.adjusted,
            "candidate selected"
        );

        Ok(LocalAnswer {
            confidence: winner.adjusted.min(1.0),
            text: winner.candidate.text,
            winning_profile: winner.candidate.profile,
            passages: passages.to_vec(),
            fallback: winner.candidate.fallback,
        })
    }

    fn score(&self, candidate: GenerationCandidate, passage_tokens: &HashSet<String>) -> Scored {
        let length_score =
            (candidate.tokens as f32 / self.config.target_tokens.max(1) as f32).min(1.0);
        let composite = PERPLEXITY_WEIGHT * candidate.perplexity_score()
            + LENGTH_WEIGHT * length_score
            + CONFIDENCE_WEIGHT * candidate.self_confidence;

        let grounding = text::grounding_fraction(&candidate.text, passage_tokens);
        let mut adjusted = composite * grounding;
        if grounding < GROUNDING_DEMOTION_FLOOR {
            adjusted *= 0.5;
        }

        Scored {
            candidate,
            grounding,
            adjusted,
        }
    }
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(RankerConfig::default())
    }
}

/// Winner first: adjusted score, then grounding, then self-confidence,
/// then lexicographically smaller profile tag
fn compare(a: &Scored, b: &Scored) -> Ordering {
    b.adjusted
        .partial_cmp(&a.adjusted)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.grounding
                .partial_cmp(&a.grounding)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            b.candidate
                .self_confidence
                .partial_cmp(&a.candidate.self_confidence)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.candidate.profile.cmp(&b.candidate.profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::SamplingParams;

    fn candidate(profile: &str, text: &str, confidence: f32, perplexity: f32) -> GenerationCandidate {
        GenerationCandidate {
            profile: profile.to_string(),
            text: text.to_string(),
            self_confidence: confidence,
            perplexity_proxy: perplexity,
            tokens: 200,
            params: SamplingParams::default(),
            fallback: false,
        }
    }

    fn grounded_passages() -> Vec<Passage> {
        vec![Passage::new(
            "kb.md",
            0,
            "hash tables store key value pairs using bucket arrays",
            0.9,
        )]
    }

    #[test]
    fn test_composite_score_formula() {
        // Fully grounded text, tokens == target, perplexity 2.0, confidence 0.8:
        // S = 0.4*0.5 + 0.3*1.0 + 0.3*0.8 = 0.74
        let ranker = CandidateRanker::default();
        let answer = ranker
            .rank(
                vec![candidate("precise", "hash tables store key value pairs", 0.8, 2.0)],
                &grounded_passages(),
            )
            .unwrap();
        assert!((answer.confidence - 0.74).abs() < 1e-4);
        assert_eq!(answer.winning_profile, "precise");
    }

    #[test]
    fn test_weak_grounding_is_demoted() {
        let ranker = CandidateRanker::default();
        let answer = ranker
            .rank(
                vec![
                    // Strong composite but nothing from the passages
                    candidate("exploratory", "quantum entanglement networking", 0.95, 1.0),
                    // Weaker composite, fully grounded
                    candidate("precise", "hash tables store key value pairs", 0.5, 2.5),
                ],
                &grounded_passages(),
            )
            .unwrap();
        assert_eq!(answer.winning_profile, "precise");
    }

    #[test]
    fn test_tie_breaks_on_profile_tag() {
        let ranker = CandidateRanker::default();
        let text = "hash tables store key value pairs";
        let answer = ranker
            .rank(
                vec![
                    candidate("balanced", text, 0.8, 2.0),
                    candidate("analytical", text, 0.8, 2.0),
                ],
                &grounded_passages(),
            )
            .unwrap();
        assert_eq!(answer.winning_profile, "analytical");
    }

    #[test]
    fn test_empty_passages_yield_insufficient_local_answer() {
        let ranker = CandidateRanker::default();
        let answer = ranker
            .rank(
                vec![candidate("precise", "some ungrounded claim", 0.9, 1.2)],
                &[],
            )
            .unwrap();
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.fallback);
        assert!(answer.text.contains("Insufficient local information"));
        assert!(answer.passages.is_empty());
    }

    #[test]
    fn test_no_candidates_is_internal_error() {
        let ranker = CandidateRanker::default();
        let err = ranker.rank(vec![], &grounded_passages()).unwrap_err();
        assert_eq!(err.kind(), docqa_core::FailureKind::Internal);
    }

    #[test]
    fn test_higher_self_confidence_breaks_grounding_tie() {
        let ranker = CandidateRanker::default();
        let text = "hash tables store key value pairs";
        let answer = ranker
            .rank(
                vec![
                    candidate("balanced", text, 0.9, 2.0),
                    candidate("analytical", text, 0.7, 2.0),
                ],
                &grounded_passages(),
            )
            .unwrap();
        // Composite differs through the confidence term, so the higher
        // confidence wins outright
        assert_eq!(answer.winning_profile, "balanced");
    }
}
