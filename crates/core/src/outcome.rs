//! Stage outcome sum type
//!
//! Every pipeline stage returns ok, degraded (value plus reason), or
//! failed. The orchestrator is the only place outcomes are mapped to a
//! response shape.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Why a stage produced a reduced-capability result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// Cross-encoder unavailable; lexical overlap scoring used
    LexicalFallback,
    /// Fewer candidates completed than requested
    PartialCandidates,
    /// Generator runtime unavailable; structured fallback answer emitted
    GeneratorFallback,
    /// External agent missed its deadline
    ExternalTimedOut,
    /// External agent failed; local answer used alone
    ExternalFailed,
}

impl DegradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradeReason::LexicalFallback => "lexical_fallback",
            DegradeReason::PartialCandidates => "partial_candidates",
            DegradeReason::GeneratorFallback => "generator_fallback",
            DegradeReason::ExternalTimedOut => "external_timed_out",
            DegradeReason::ExternalFailed => "external_failed",
        }
    }
}

/// Typed result of one pipeline stage
#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    Ok(T),
    Degraded { value: T, reasons: Vec<DegradeReason> },
    Failed(Error),
}

impl<T> StageOutcome<T> {
    /// Degraded with a single reason
    pub fn degraded(value: T, reason: DegradeReason) -> Self {
        StageOutcome::Degraded {
            value,
            reasons: vec![reason],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    /// The carried value, if the stage did not fail
    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Ok(v) => Some(v),
            StageOutcome::Degraded { value, .. } => Some(value),
            StageOutcome::Failed(_) => None,
        }
    }

    /// Degrade reasons, empty unless degraded
    pub fn reasons(&self) -> &[DegradeReason] {
        match self {
            StageOutcome::Degraded { reasons, .. } => reasons,
            _ => &[],
        }
    }

    /// Convert to a plain result, dropping degrade annotations
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            StageOutcome::Ok(v) => Ok(v),
            StageOutcome::Degraded { value, .. } => Ok(value),
            StageOutcome::Failed(e) => Err(e),
        }
    }
}
