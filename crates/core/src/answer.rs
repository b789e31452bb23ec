//! Answer types: local, external, and merged

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Passage;

/// Best-of-N winner plus the passages it was generated from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAnswer {
    pub text: String,
    /// Aggregate confidence in [0, 1], derived from the ranker score
    pub confidence: f32,
    /// Profile tag of the winning candidate
    pub winning_profile: String,
    /// Passages used as context, in final ranked order
    pub passages: Vec<Passage>,
    /// True when this is the structured fallback answer
    pub fallback: bool,
}

/// Answer produced by the external knowledge agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAnswer {
    pub text: String,
    pub confidence: f32,
    /// Ordered source URIs; empty only when confidence is zero
    pub sources: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ExternalAnswer {
    /// Construct, enforcing that a sourceless answer carries no confidence
    pub fn new(text: impl Into<String>, confidence: f32, sources: Vec<String>) -> Self {
        let confidence = if sources.is_empty() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            text: text.into(),
            confidence,
            sources,
            metadata: HashMap::new(),
        }
    }
}

/// How the local and external answers were combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// High similarity: the stronger answer, confirmed by the other
    Reinforcing,
    /// Moderate similarity: stronger answer plus additional context
    Complementary,
    /// Low similarity: both answers, clearly separated
    Conflicting,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Reinforcing => "reinforcing",
            MergeStrategy::Complementary => "complementary",
            MergeStrategy::Conflicting => "conflicting",
        }
    }
}

/// Provenance entry: local passages first, then external sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceRef {
    Local {
        source_id: String,
        chunk_index: u32,
        score: f32,
    },
    External {
        uri: String,
        /// The external answer's confidence, surfaced as a score
        score: f32,
    },
}

/// Final grounded answer with provenance and confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub text: String,
    /// Fused confidence in [0, 1]
    pub confidence: f32,
    /// Absent when no external answer participated
    pub strategy: Option<MergeStrategy>,
    /// Token-set similarity between local and external answers
    pub similarity: f32,
    /// Length-based coherence proxy; recorded, never gated on
    pub coherence: f32,
    /// Ordered provenance: local passages, then external sources
    pub provenance: Vec<SourceRef>,
    /// Degraded-mode annotations (e.g. "external_timed_out")
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl MergeResult {
    /// Wrap a local-only answer; strategy and similarity are absent/zero
    pub fn from_local(local: &LocalAnswer, coherence: f32) -> Self {
        let provenance = local
            .passages
            .iter()
            .map(|p| SourceRef::Local {
                source_id: p.source_id.clone(),
                chunk_index: p.chunk_index,
                score: p.score,
            })
            .collect();
        Self {
            text: local.text.clone(),
            confidence: local.confidence,
            strategy: None,
            similarity: 0.0,
            coherence,
            provenance,
            annotations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sourceless_external_answer_has_zero_confidence() {
        let ans = ExternalAnswer::new("no sources found", 0.9, vec![]);
        assert_eq!(ans.confidence, 0.0);

        let ans = ExternalAnswer::new("grounded", 0.9, vec!["https://a".into()]);
        assert_eq!(ans.confidence, 0.9);
    }

    #[test]
    fn test_strategy_serializes_lowercase() {
        let json = serde_json::to_string(&MergeStrategy::Complementary).unwrap();
        assert_eq!(json, "\"complementary\"");
    }

    #[test]
    fn test_source_ref_tagging() {
        let local = SourceRef::Local {
            source_id: "kb.md".into(),
            chunk_index: 1,
            score: 0.7,
        };
        let json = serde_json::to_value(&local).unwrap();
        assert_eq!(json["type"], "local");
        assert_eq!(json["chunk_index"], 1);

        let external = SourceRef::External {
            uri: "https://example.org".into(),
            score: 0.8,
        };
        let json = serde_json::to_value(&external).unwrap();
        assert_eq!(json["type"], "external");
    }

    #[test]
    fn test_from_local_preserves_passage_order() {
        let local = LocalAnswer {
            text: "answer".into(),
            confidence: 0.8,
            winning_profile: "precise".into(),
            passages: vec![
                Passage::new("a.md", 0, "first", 0.9),
                Passage::new("b.md", 3, "second", 0.5),
            ],
            fallback: false,
        };
        let merged = MergeResult::from_local(&local, 1.0);
        assert_eq!(merged.provenance.len(), 2);
        match &merged.provenance[0] {
            SourceRef::Local { source_id, .. } => assert_eq!(source_id, "a.md"),
            _ => panic!("expected local source"),
        }
        assert!(merged.strategy.is_none());
    }
}
