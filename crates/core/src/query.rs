//! Query normalization and fingerprinting
//!
//! The fingerprint is the cache key: a stable hash of the normalized
//! question plus the optional document scope. Normalization must be
//! idempotent so that re-normalizing a normalized query is a no-op.

use serde::{Deserialize, Serialize};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// An incoming question, normalized once at request entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Raw text as received
    pub raw: String,
    /// Normalized text used for embedding and caching
    pub normalized: String,
    /// Stable hash of normalized text and scope
    pub fingerprint: u64,
    /// Optional document scope restricting retrieval
    pub scope: Option<String>,
}

impl Query {
    /// Build a query, normalizing and fingerprinting the raw text
    pub fn new(raw: impl Into<String>, scope: Option<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        let fingerprint = fingerprint(&normalized, scope.as_deref());
        Self {
            raw,
            normalized,
            fingerprint,
            scope,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Normalize a question: lowercase, collapse whitespace, strip trailing
/// punctuation. Idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['?', '!', '.', ',', ';', ':'])
        .trim_end()
        .to_string()
}

/// Stable fingerprint over normalized text and scope (FNV-1a 64)
pub fn fingerprint(normalized: &str, scope: Option<&str>) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in normalized.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    // Unit separator keeps ("ab", None) distinct from ("a", Some("b"))
    hash ^= 0x1f;
    hash = hash.wrapping_mul(FNV_PRIME);
    if let Some(scope) = scope {
        for byte in scope.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize("  What   is TypeScript? ");
        let twice = normalize(&once);
        assert_eq!(once, "what is typescript");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = Query::new("What is TypeScript?", None);
        let b = Query::new("what   is typescript", None);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_scope_changes_fingerprint() {
        let unscoped = Query::new("explain hash tables", None);
        let scoped = Query::new("explain hash tables", Some("doc-42".into()));
        assert_ne!(unscoped.fingerprint, scoped.fingerprint);
    }

    #[test]
    fn test_scope_boundary_is_unambiguous() {
        let a = Query::new("ab", None);
        let b = Query::new("a", Some("b".into()));
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_empty_query() {
        let q = Query::new("   ?!  ", None);
        assert!(q.is_empty());
    }
}
