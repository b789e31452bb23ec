//! External knowledge agent client
//!
//! The agent is opaque beyond its contract: it answers a query with text,
//! confidence and source URIs. The orchestrator enforces the external
//! deadline by dropping the in-flight future, so the client holds no
//! state across calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_core::{Error, ExternalAgent, ExternalAnswer, Result};

/// HTTP external agent configuration
#[derive(Debug, Clone)]
pub struct HttpExternalAgentConfig {
    /// Answer endpoint URL
    pub endpoint: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Client-level timeout; the orchestrator applies the stage deadline
    /// on top of this
    pub timeout: Duration,
}

impl Default for HttpExternalAgentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    answer: String,
    confidence: f32,
    #[serde(default)]
    sources: Vec<String>,
}

/// External knowledge agent over HTTP
pub struct HttpExternalAgent {
    client: Client,
    config: HttpExternalAgentConfig,
}

impl HttpExternalAgent {
    pub fn new(config: HttpExternalAgentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::upstream("external agent", format!("client init: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ExternalAgent for HttpExternalAgent {
    async fn answer(&self, query: &str) -> Result<ExternalAnswer> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&AnswerRequest { query });

        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::upstream("external agent", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                "external agent",
                format!("{} - {}", status, body),
            ));
        }

        let parsed: AnswerResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream("external agent", format!("invalid response: {}", e)))?;

        Ok(ExternalAnswer::new(
            parsed.answer,
            parsed.confidence,
            parsed.sources,
        ))
    }

    fn enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Null agent used when external lookup is disabled
pub struct DisabledExternalAgent;

#[async_trait]
impl ExternalAgent for DisabledExternalAgent {
    async fn answer(&self, _query: &str) -> Result<ExternalAnswer> {
        Err(Error::upstream("external agent", "disabled"))
    }

    fn enabled(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_agent() {
        let agent = DisabledExternalAgent;
        assert!(!agent.enabled());
        let err = agent.answer("anything").await.unwrap_err();
        assert_eq!(err.kind(), docqa_core::FailureKind::Upstream);
    }
}
