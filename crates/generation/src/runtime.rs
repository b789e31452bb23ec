//! Generator runtime backends
//!
//! `HttpGenerator` talks to a model runtime's completion API with
//! bounded retries; `UnavailableGenerator` is the null implementation
//! selected when no runtime is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_core::text;
use docqa_core::{Error, GeneratorRuntime, Result, SampleOutput, SamplingParams};

/// HTTP generator configuration
#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Model runtime endpoint
    pub endpoint: String,
    /// Model name/ID
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "phi3:mini".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<usize>,
    /// Reported by runtimes that expose token likelihoods
    #[serde(default)]
    avg_logprob: Option<f32>,
}

/// Generator backed by a model runtime's `/api/generate` endpoint
pub struct HttpGenerator {
    client: Client,
    config: HttpGeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::upstream("generator", format!("client init: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn sample_once(&self, prompt: &str, params: &SamplingParams) -> Result<SampleOutput> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                top_p: params.top_p,
                num_predict: params.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream("generator", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                "generator",
                format!("{} - {}", status, body),
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream("generator", format!("invalid response: {}", e)))?;

        let tokens = parsed
            .eval_count
            .unwrap_or_else(|| text::estimate_tokens(&parsed.response));

        Ok(SampleOutput {
            text: parsed.response,
            avg_log_likelihood: parsed.avg_logprob,
            tokens,
        })
    }
}

#[async_trait]
impl GeneratorRuntime for HttpGenerator {
    async fn sample(&self, prompt: &str, params: &SamplingParams) -> Result<SampleOutput> {
        let mut backoff = self.config.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.sample_once(prompt, params).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "generation attempt failed");
                    last_error = Some(e);
                },
            }
        }

        Err(last_error.unwrap_or_else(|| Error::upstream("generator", "no attempts made")))
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint);
        matches!(
            tokio::time::timeout(Duration::from_secs(2), self.client.get(&url).send()).await,
            Ok(Ok(resp)) if resp.status().is_success()
        )
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Null runtime returning structured unavailable outcomes
pub struct UnavailableGenerator;

#[async_trait]
impl GeneratorRuntime for UnavailableGenerator {
    async fn sample(&self, _prompt: &str, _params: &SamplingParams) -> Result<SampleOutput> {
        Err(Error::upstream("generator", "no runtime configured"))
    }

    async fn is_available(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_generator() {
        let runtime = UnavailableGenerator;
        assert!(!runtime.is_available().await);
        let err = runtime
            .sample("prompt", &SamplingParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), docqa_core::FailureKind::Upstream);
    }

    #[test]
    fn test_config_default() {
        let config = HttpGeneratorConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
