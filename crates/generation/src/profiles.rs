//! Fixed sampling profiles
//!
//! The N sampling regimes are part of the design, not caller input. Each
//! profile pairs sampling parameters with an instruction style so the
//! ranker sees genuinely diverse drafts.

use docqa_core::SamplingParams;

/// One sampling regime for candidate generation
#[derive(Debug, Clone, Copy)]
pub struct SamplingProfile {
    /// Stable tag, also the deterministic tie-break key
    pub tag: &'static str,
    pub temperature: f32,
    pub top_p: f32,
    /// Instruction line injected into the prompt
    pub instruction: &'static str,
}

/// The fixed profile table, most conservative first
pub const PROFILES: &[SamplingProfile] = &[
    SamplingProfile {
        tag: "precise",
        temperature: 0.2,
        top_p: 0.8,
        instruction: "Provide a precise, factual answer based strictly on the context.",
    },
    SamplingProfile {
        tag: "balanced",
        temperature: 0.5,
        top_p: 0.9,
        instruction: "Provide a well-balanced answer that covers the key aspects.",
    },
    SamplingProfile {
        tag: "exploratory",
        temperature: 0.9,
        top_p: 0.95,
        instruction: "Provide an insightful answer that explores implications and connections.",
    },
    SamplingProfile {
        tag: "analytical",
        temperature: 0.4,
        top_p: 0.9,
        instruction: "Break the question down step by step and reason through each part.",
    },
    SamplingProfile {
        tag: "focused",
        temperature: 0.3,
        top_p: 0.85,
        instruction: "Identify the core of the question and address it directly.",
    },
    SamplingProfile {
        tag: "comprehensive",
        temperature: 0.6,
        top_p: 0.9,
        instruction: "Provide a thorough answer with step-by-step explanation and examples.",
    },
];

/// First `n` profiles, capped at the table size
pub fn profiles_for(n: usize) -> &'static [SamplingProfile] {
    &PROFILES[..n.min(PROFILES.len())]
}

impl SamplingProfile {
    pub fn params(&self, max_tokens: usize) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens,
        }
    }

    /// Build the prompt for this profile
    pub fn prompt(&self, question: &str, context: &str) -> String {
        if context.is_empty() {
            format!(
                "Question: {question}\n\nInstructions: {instruction} If you do not have \
                 enough information, say so explicitly.\n\nAnswer:",
                question = question,
                instruction = self.instruction,
            )
        } else {
            format!(
                "Context:\n{context}\n\nQuestion: {question}\n\nInstructions: {instruction}\n\nAnswer:",
                context = context,
                question = question,
                instruction = self.instruction,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_profiles_are_distinct() {
        let tags: HashSet<&str> = PROFILES.iter().map(|p| p.tag).collect();
        assert_eq!(tags.len(), PROFILES.len());

        // Distinct regimes: no two profiles share (temperature, top_p)
        let regimes: HashSet<String> = PROFILES
            .iter()
            .map(|p| format!("{:.2}/{:.2}", p.temperature, p.top_p))
            .collect();
        assert_eq!(regimes.len(), PROFILES.len());
    }

    #[test]
    fn test_at_least_four_profiles() {
        assert!(PROFILES.len() >= 4);
    }

    #[test]
    fn test_profiles_for_caps_at_table() {
        assert_eq!(profiles_for(3).len(), 3);
        assert_eq!(profiles_for(100).len(), PROFILES.len());
    }

    #[test]
    fn test_prompt_mentions_context_and_question() {
        let profile = &PROFILES[0];
        let prompt = profile.prompt("What is a B-tree?", "[kb.md#0]\nB-trees are balanced.");
        assert!(prompt.contains("What is a B-tree?"));
        assert!(prompt.contains("kb.md#0"));
        assert!(prompt.contains(profile.instruction));
    }

    #[test]
    fn test_empty_context_prompt() {
        let prompt = PROFILES[0].prompt("What is a B-tree?", "");
        assert!(prompt.contains("enough information"));
    }
}
