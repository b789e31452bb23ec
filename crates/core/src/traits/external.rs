//! External knowledge agent interface

use async_trait::async_trait;

use crate::{ExternalAnswer, Result};

/// On-demand answer from an external corpus, with citations
///
/// Calls must be cancellable by dropping the future; the orchestrator
/// enforces the external deadline that way.
#[async_trait]
pub trait ExternalAgent: Send + Sync {
    /// Answer a query from the external corpus
    async fn answer(&self, query: &str) -> Result<ExternalAnswer>;

    /// False for the disabled/null implementation
    fn enabled(&self) -> bool;

    /// Agent name for logging
    fn name(&self) -> &str;
}
