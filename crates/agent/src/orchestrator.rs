//! Request orchestrator
//!
//! Drives one request through `retrieve -> generate -> rank -> gate ->
//! (merge) -> cache -> respond` with per-stage deadlines, the optional
//! eager external pre-gate, and single-flight de-duplication. No lock is
//! held across an await; request state is owned by this task alone.

use std::sync::Arc;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration, Instant};
use uuid::Uuid;

use docqa_config::Settings;
use docqa_core::{
    DegradeReason, Error, ExternalAgent, ExternalAnswer, MergeResult, MergeStrategy, Query, Result,
    SourceRef, StageOutcome,
};
use docqa_generation::{CandidateGenerator, CandidateRanker};
use docqa_retrieval::{RerankMode, Retriever};

use crate::cache::{AnswerCache, Flight};
use crate::merger::AnswerMerger;

/// Incoming question
#[derive(Debug, Clone, Deserialize)]
pub struct QaRequest {
    pub question: String,
    /// Optional document scope for retrieval and cache keying
    #[serde(default)]
    pub document_id: Option<String>,
    /// Allow the external agent for this request (default true)
    #[serde(default)]
    pub use_external: Option<bool>,
}

/// Final response payload
#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<SourceRef>,
    pub processing_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MergeStrategy>,
    pub cached: bool,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank: Option<&'static str>,
    #[serde(skip_serializing_if = "is_false")]
    pub external_timed_out: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy)]
struct GateSettings {
    theta_local: f32,
    pre_gate_enabled: bool,
    pre_gate_floor: f32,
}

#[derive(Debug, Clone, Copy)]
struct Deadlines {
    retrieve: Duration,
    generate: Duration,
    external: Duration,
    total: Duration,
}

/// The QA pipeline: composed once at startup, shared by reference
pub struct QaPipeline {
    retriever: Retriever,
    generator: CandidateGenerator,
    ranker: CandidateRanker,
    merger: AnswerMerger,
    external: Arc<dyn ExternalAgent>,
    cache: Arc<AnswerCache>,
    gate: GateSettings,
    deadlines: Deadlines,
}

impl QaPipeline {
    pub fn new(
        retriever: Retriever,
        generator: CandidateGenerator,
        ranker: CandidateRanker,
        merger: AnswerMerger,
        external: Arc<dyn ExternalAgent>,
        cache: Arc<AnswerCache>,
        settings: &Settings,
    ) -> Self {
        Self {
            retriever,
            generator,
            ranker,
            merger,
            external,
            cache,
            gate: GateSettings {
                theta_local: settings.gate.theta_local,
                pre_gate_enabled: settings.gate.pre_gate_enabled,
                pre_gate_floor: settings.gate.pre_gate_floor,
            },
            deadlines: Deadlines {
                retrieve: Duration::from_millis(settings.deadlines.retrieve_ms),
                generate: Duration::from_millis(settings.deadlines.generate_ms),
                external: Duration::from_millis(settings.deadlines.external_ms),
                total: Duration::from_millis(settings.deadlines.total_ms),
            },
        }
    }

    pub fn cache(&self) -> &Arc<AnswerCache> {
        &self.cache
    }

    /// Answer one request
    pub async fn answer(&self, request: QaRequest) -> Result<QaResponse> {
        let started = Instant::now();

        if request.question.trim().is_empty() {
            return Err(Error::Validation("question must not be empty".into()));
        }

        let query = Query::new(&request.question, request.document_id.clone());
        let request_id = Uuid::new_v4();
        counter!("qa_requests_total").increment(1);

        // Short-circuit: Received -> Responded on a fresh cache entry
        if let Some(result) = self.cache.get(query.fingerprint) {
            counter!("qa_cache_hits_total").increment(1);
            tracing::debug!(%request_id, fingerprint = query.fingerprint, "cache hit");
            return Ok(self.respond(result, true, started));
        }

        match self.cache.begin(query.fingerprint) {
            Flight::Follower(mut receiver) => {
                tracing::debug!(
                    %request_id,
                    fingerprint = query.fingerprint,
                    "joined in-flight computation"
                );
                let outcome = timeout(self.deadlines.total, receiver.recv())
                    .await
                    .map_err(|_| Error::timeout("total"))?
                    .map_err(|_| Error::Internal("single-flight channel closed".into()))?;
                let result = outcome?;
                Ok(self.respond(result, false, started))
            },
            Flight::Leader(guard) => {
                // A completing flight may have landed between get and begin
                if let Some(result) = self.cache.get(query.fingerprint) {
                    guard.complete(result.clone());
                    return Ok(self.respond(result, true, started));
                }

                let total_deadline = started + self.deadlines.total;
                match timeout(self.deadlines.total, self.run(&query, &request, request_id, total_deadline))
                    .await
                {
                    Ok(Ok(result)) => {
                        guard.complete(result.clone());
                        Ok(self.respond(result, false, started))
                    },
                    Ok(Err(e)) => {
                        counter!("qa_failures_total", "kind" => e.kind().as_str()).increment(1);
                        guard.fail(e.clone());
                        Err(e)
                    },
                    Err(_) => {
                        let e = Error::timeout("total");
                        counter!("qa_failures_total", "kind" => "timeout").increment(1);
                        guard.fail(e.clone());
                        Err(e)
                    },
                }
            },
        }
    }

    /// Leader path: the full state machine after a cache miss
    async fn run(
        &self,
        query: &Query,
        request: &QaRequest,
        request_id: Uuid,
        total_deadline: Instant,
    ) -> Result<MergeResult> {
        let mut annotations: Vec<String> = Vec::new();

        // Retrieving
        tracing::debug!(%request_id, state = "retrieving");
        let stage_start = Instant::now();
        let retrieval = timeout(self.deadlines.retrieve, self.retriever.retrieve(query))
            .await
            .map_err(|_| Error::timeout("retrieve"))??;
        histogram!("qa_stage_duration_ms", "stage" => "retrieve")
            .record(stage_start.elapsed().as_millis() as f64);

        if retrieval.rerank_mode == RerankMode::LexicalFallback {
            annotations.push(DegradeReason::LexicalFallback.as_str().to_string());
        }

        let external_allowed = self.external.enabled() && request.use_external.unwrap_or(true);

        // Optional pre-gate: weak retrieval predicts a low-confidence local
        // answer, so the external lookup starts now, in parallel with
        // generation. Its result is only consumed if the real gate fires.
        let weak_retrieval =
            retrieval.top_score().unwrap_or(0.0) < self.gate.pre_gate_floor;
        let eager_external = if external_allowed && self.gate.pre_gate_enabled && weak_retrieval {
            tracing::debug!(%request_id, "pre-gate heuristic fired, starting external eagerly");
            let agent = Arc::clone(&self.external);
            let question = query.normalized.clone();
            let deadline = self.deadlines.external;
            Some(tokio::spawn(async move {
                timeout(deadline, agent.answer(&question)).await
            }))
        } else {
            None
        };

        // Generating
        tracing::debug!(%request_id, state = "generating", passages = retrieval.passages.len());
        let stage_start = Instant::now();
        let generation = self
            .generator
            .generate(query, &retrieval.passages, self.deadlines.generate)
            .await;
        histogram!("qa_stage_duration_ms", "stage" => "generate")
            .record(stage_start.elapsed().as_millis() as f64);

        for reason in generation.reasons() {
            annotations.push(reason.as_str().to_string());
        }
        let candidates = match generation {
            StageOutcome::Failed(e) => {
                if let Some(handle) = eager_external {
                    handle.abort();
                }
                return Err(e);
            },
            other => other.into_result()?,
        };

        // Ranked
        let local = self.ranker.rank(candidates, &retrieval.passages)?;
        tracing::debug!(
            %request_id,
            state = "ranked",
            confidence = local.confidence,
            profile = %local.winning_profile
        );

        // Gated
        if local.confidence >= self.gate.theta_local || !external_allowed {
            if let Some(handle) = eager_external {
                handle.abort();
            }
            tracing::debug!(%request_id, state = "gated", external = false);
            let mut result = self.merger.local_only(&local);
            result.annotations = annotations;
            return Ok(finalize(result));
        }

        // Merging
        tracing::debug!(%request_id, state = "merging");
        counter!("qa_external_consultations_total").increment(1);
        let external_outcome = match eager_external {
            Some(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(%request_id, error = %e, "eager external task failed");
                    Ok(Err(Error::upstream("external agent", e.to_string())))
                },
            },
            None => {
                // Never wait past the request's own deadline
                let remaining = total_deadline.saturating_duration_since(Instant::now());
                timeout(
                    self.deadlines.external.min(remaining),
                    self.external.answer(&query.normalized),
                )
                .await
            },
        };

        let result = match external_outcome {
            Ok(Ok(external)) => self.merge(&local, &external, annotations)?,
            Ok(Err(e)) => {
                tracing::warn!(%request_id, error = %e, "external agent failed, local answer only");
                annotations.push(DegradeReason::ExternalFailed.as_str().to_string());
                let mut result = self.merger.local_only(&local);
                result.annotations = annotations;
                result
            },
            Err(_) => {
                tracing::warn!(%request_id, "external agent timed out, local answer only");
                annotations.push(DegradeReason::ExternalTimedOut.as_str().to_string());
                let mut result = self.merger.local_only(&local);
                result.annotations = annotations;
                result
            },
        };

        Ok(finalize(result))
    }

    fn merge(
        &self,
        local: &docqa_core::LocalAnswer,
        external: &ExternalAnswer,
        annotations: Vec<String>,
    ) -> Result<MergeResult> {
        let mut merged = self.merger.merge(local, external)?;
        merged.annotations = annotations;
        Ok(merged)
    }

    fn respond(&self, result: MergeResult, cached: bool, started: Instant) -> QaResponse {
        let degraded = !result.annotations.is_empty();
        let rerank = result
            .annotations
            .iter()
            .any(|a| a == DegradeReason::LexicalFallback.as_str())
            .then_some(DegradeReason::LexicalFallback.as_str());
        let external_timed_out = result
            .annotations
            .iter()
            .any(|a| a == DegradeReason::ExternalTimedOut.as_str());

        QaResponse {
            answer: result.text,
            confidence: result.confidence,
            sources: result.provenance,
            processing_ms: started.elapsed().as_millis() as u64,
            strategy: result.strategy,
            cached,
            degraded,
            rerank,
            external_timed_out,
        }
    }
}

/// Response invariant: sources are non-empty iff confidence is positive
fn finalize(mut result: MergeResult) -> MergeResult {
    if result.confidence <= 0.0 {
        result.provenance.clear();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_clears_sources_at_zero_confidence() {
        let result = MergeResult {
            text: "insufficient".into(),
            confidence: 0.0,
            strategy: None,
            similarity: 0.0,
            coherence: 0.2,
            provenance: vec![SourceRef::Local {
                source_id: "kb.md".into(),
                chunk_index: 0,
                score: 0.4,
            }],
            annotations: Vec::new(),
        };
        assert!(finalize(result).provenance.is_empty());
    }

    #[test]
    fn test_response_serialization_shape() {
        let response = QaResponse {
            answer: "text".into(),
            confidence: 0.8,
            sources: Vec::new(),
            processing_ms: 12,
            strategy: None,
            cached: false,
            degraded: false,
            rerank: None,
            external_timed_out: false,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("strategy").is_none());
        assert!(json.get("external_timed_out").is_none());
        assert!(json.get("rerank").is_none());
        assert_eq!(json["cached"], false);
        assert_eq!(json["degraded"], false);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: QaRequest =
            serde_json::from_str(r#"{"question": "What is TypeScript?"}"#).unwrap();
        assert_eq!(request.question, "What is TypeScript?");
        assert!(request.document_id.is_none());
        assert!(request.use_external.is_none());
    }
}
