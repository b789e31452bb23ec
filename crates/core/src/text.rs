//! Text utilities shared by rerank fallback, grounding and merging
//!
//! All scoring that compares answer text against passages or other
//! answers goes through the same tokenizer so the numbers are comparable
//! across stages.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use unicode_segmentation::UnicodeSegmentation;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "i", "you", "we",
        "they", "he", "she", "it", "this", "that", "these", "those", "what", "which", "who",
        "whom", "whose", "to", "for", "in", "on", "at", "by", "with", "from", "of", "as", "and",
        "or", "but", "if", "then", "else", "when", "where", "how", "why", "not", "no", "do",
        "does", "did", "can", "could", "will", "would", "should", "may", "might", "have", "has",
        "had", "there", "here", "its", "their", "your", "our", "about", "into", "than", "also",
    ]
    .into_iter()
    .collect()
});

/// Lowercase alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Content-bearing tokens: stopwords and very short tokens removed
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() > 2 && !STOPWORDS.contains(t.as_str()))
        .collect()
}

/// Light suffix stemming, enough to match "tables" against "table"
pub fn stem(token: &str) -> String {
    for suffix in ["ing", "ed", "ies", "ly", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.len() >= 3 {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}

/// Stemmed content-token set
pub fn content_token_set(text: &str) -> HashSet<String> {
    content_tokens(text).iter().map(|t| stem(t)).collect()
}

/// Token-set Jaccard similarity in [0, 1]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Bonus when the normalized query appears verbatim in the passage
pub fn phrase_bonus(query: &str, passage: &str) -> f32 {
    let query = query.trim().to_lowercase();
    if query.len() >= 6 && passage.to_lowercase().contains(&query) {
        0.2
    } else {
        0.0
    }
}

/// Rough token count from grapheme clusters; never zero for non-empty text
pub fn estimate_tokens(text: &str) -> usize {
    let graphemes = text.graphemes(true).count();
    if graphemes == 0 {
        0
    } else {
        (graphemes / 4).max(1)
    }
}

/// Fraction of an answer's content tokens that appear in the passages
/// (exact or stemmed)
pub fn grounding_fraction(answer: &str, passage_tokens: &HashSet<String>) -> f32 {
    let tokens = content_tokens(answer);
    if tokens.is_empty() {
        return 0.0;
    }
    let supported = tokens
        .iter()
        .filter(|t| passage_tokens.contains(*t) || passage_tokens.contains(&stem(t)))
        .count();
    supported as f32 / tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_tokens_drop_stopwords() {
        let tokens = content_tokens("What is the default isolation level?");
        assert!(tokens.contains(&"default".to_string()));
        assert!(tokens.contains(&"isolation".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"is".to_string()));
    }

    #[test]
    fn test_stemming_matches_plurals() {
        assert_eq!(stem("tables"), "table");
        assert_eq!(stem("hashing"), "hash");
        assert_eq!(stem("indexed"), "index");
        // Short tokens are left alone
        assert_eq!(stem("les"), "les");
    }

    #[test]
    fn test_jaccard() {
        let a = content_token_set("hash tables store key value pairs");
        let b = content_token_set("a hash table stores pairs of keys and values");
        let sim = jaccard(&a, &b);
        assert!(sim > 0.5, "stemmed overlap should be high, got {sim}");

        let empty = HashSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn test_phrase_bonus() {
        assert_eq!(
            phrase_bonus("binary search", "Use binary search on sorted arrays"),
            0.2
        );
        assert_eq!(phrase_bonus("binary search", "Use a linear scan"), 0.0);
    }

    #[test]
    fn test_grounding_fraction() {
        let passages = content_token_set("PostgreSQL supports transactions and indexes");
        let grounded = grounding_fraction("PostgreSQL supports transactions", &passages);
        assert!(grounded > 0.9);

        let ungrounded = grounding_fraction("kernel scheduling latency", &passages);
        assert_eq!(ungrounded, 0.0);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert!(estimate_tokens("word") >= 1);
        let long = "tokens ".repeat(100);
        assert!(estimate_tokens(&long) > 100);
    }
}
