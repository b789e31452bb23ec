//! Error types shared across the pipeline
//!
//! Every stage classifies its failures into one of four kinds; the
//! orchestrator maps the kind to a response status at the boundary.

use thiserror::Error;

/// Result alias using the pipeline error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classification used for response mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed or empty request
    Validation,
    /// A collaborator (embedder, index, generator, external agent) failed
    Upstream,
    /// A stage or the whole request exceeded its deadline
    Timeout,
    /// Broken invariant; programmer error
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Upstream => "upstream",
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
        }
    }
}

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{service} unavailable: {reason}")]
    Upstream { service: String, reason: String },

    #[error("{stage} deadline exceeded")]
    Timeout { stage: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Upstream failure for a named collaborator
    pub fn upstream(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Upstream {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Deadline miss for a named stage
    pub fn timeout(stage: impl Into<String>) -> Self {
        Error::Timeout {
            stage: stage.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Validation(_) => FailureKind::Validation,
            Error::Upstream { .. } => FailureKind::Upstream,
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::Internal(_) => FailureKind::Internal,
        }
    }
}
