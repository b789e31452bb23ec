//! Passage retriever
//!
//! Composes embedder, vector index and reranker; owns relevance
//! thresholds, filtering and final passage selection. Deterministic for
//! fixed index contents.

use std::sync::Arc;
use std::time::Duration;

use docqa_core::{ChunkHit, Embedder, Error, Passage, Query, Reranker, Result, VectorIndex};

use crate::reranker::LexicalScorer;
use docqa_config::constants::retrieval as tuning;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Passages to return
    pub top_k: usize,
    /// Coarse similarity floor applied before reranking
    pub min_retrieval_score: f32,
    /// Final-score threshold applied after reranking
    pub min_final_score: f32,
    /// Per-attempt vector index timeout; one retry with halved pool
    pub index_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: tuning::DEFAULT_TOP_K,
            min_retrieval_score: tuning::MIN_RETRIEVAL_SCORE,
            min_final_score: tuning::MIN_FINAL_SCORE,
            index_timeout: Duration::from_millis(1_000),
        }
    }
}

impl From<&docqa_config::Settings> for RetrieverConfig {
    fn from(settings: &docqa_config::Settings) -> Self {
        Self {
            top_k: settings.retrieval.top_k,
            min_retrieval_score: settings.retrieval.min_retrieval_score,
            min_final_score: settings.retrieval.min_final_score,
            // Two attempts must fit in the retrieve stage deadline
            index_timeout: Duration::from_millis(settings.deadlines.retrieve_ms / 2),
        }
    }
}

/// How the candidate set was reranked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankMode {
    CrossEncoder,
    LexicalFallback,
}

impl RerankMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerankMode::CrossEncoder => "cross_encoder",
            RerankMode::LexicalFallback => "lexical_fallback",
        }
    }
}

/// Retrieval result: ranked passages plus the rerank mode used
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub passages: Vec<Passage>,
    pub rerank_mode: RerankMode,
}

impl Retrieval {
    /// Final score of the best passage, if any
    pub fn top_score(&self) -> Option<f32> {
        self.passages.first().map(|p| p.score)
    }
}

/// Dense retriever with cross-encoder reranking and lexical fallback
pub struct Retriever {
    config: RetrieverConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl Retriever {
    pub fn new(
        config: RetrieverConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            config,
            embedder,
            index,
            reranker: None,
        }
    }

    /// Set the cross-encoder; without one, every request uses the lexical
    /// fallback scorer
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Retrieve passages for a normalized query
    ///
    /// An empty index result is success with an empty passage list, not an
    /// error. Embedding failure is fatal; an index timeout is retried once
    /// with a halved pool before becoming fatal.
    pub async fn retrieve(&self, query: &Query) -> Result<Retrieval> {
        let vector = self.embedder.embed(&query.normalized).await?;

        let k_initial =
            (self.config.top_k * tuning::INITIAL_POOL_FACTOR).max(tuning::INITIAL_POOL_FLOOR);
        let hits = self
            .search_with_retry(&vector, k_initial, query.scope.as_deref())
            .await?;

        if hits.is_empty() {
            tracing::info!(fingerprint = query.fingerprint, "no candidates from index");
            return Ok(Retrieval {
                passages: Vec::new(),
                rerank_mode: self.configured_mode(),
            });
        }

        let mut passages: Vec<Passage> = hits
            .into_iter()
            .filter(|h| h.score >= self.config.min_retrieval_score && !h.content.is_empty())
            .map(Self::to_passage)
            .collect();

        if passages.is_empty() {
            return Ok(Retrieval {
                passages,
                rerank_mode: self.configured_mode(),
            });
        }

        let (scores, rerank_mode) = self.rerank(&query.normalized, &passages).await;
        for (passage, rerank_score) in passages.iter_mut().zip(scores) {
            passage.rerank_score = rerank_score;
            passage.score = tuning::RETRIEVAL_WEIGHT * passage.retrieval_score
                + tuning::RERANK_WEIGHT * rerank_score;
        }

        passages.retain(|p| p.score >= self.config.min_final_score);
        passages.sort_by(Passage::cmp_ranked);
        passages.truncate(self.config.top_k);

        tracing::debug!(
            fingerprint = query.fingerprint,
            passages = passages.len(),
            mode = rerank_mode.as_str(),
            "retrieval complete"
        );

        Ok(Retrieval {
            passages,
            rerank_mode,
        })
    }

    fn to_passage(hit: ChunkHit) -> Passage {
        let source_id = if hit.source_id.is_empty() {
            hit.chunk_id.clone()
        } else {
            hit.source_id.clone()
        };
        let mut passage = Passage::new(
            source_id,
            hit.chunk_index,
            hit.content,
            hit.score.clamp(0.0, 1.0),
        );
        passage.metadata = hit.metadata;
        passage
    }

    fn configured_mode(&self) -> RerankMode {
        if self.reranker.is_some() {
            RerankMode::CrossEncoder
        } else {
            RerankMode::LexicalFallback
        }
    }

    /// Score passages with the cross-encoder, or lexically when it is
    /// absent or failing. Reranker failure degrades, never fails.
    async fn rerank(&self, query: &str, passages: &[Passage]) -> (Vec<f32>, RerankMode) {
        if let Some(ref reranker) = self.reranker {
            let contents: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
            match reranker.score(query, &contents).await {
                Ok(raw) if raw.len() == passages.len() => {
                    return (raw.into_iter().map(squash).collect(), RerankMode::CrossEncoder);
                },
                Ok(raw) => {
                    tracing::warn!(
                        expected = passages.len(),
                        got = raw.len(),
                        "reranker returned wrong score count, using lexical fallback"
                    );
                },
                Err(e) => {
                    tracing::warn!(error = %e, "reranker unavailable, using lexical fallback");
                },
            }
        }

        let scores = passages
            .iter()
            .map(|p| LexicalScorer::score(query, &p.content))
            .collect();
        (scores, RerankMode::LexicalFallback)
    }

    async fn search_with_retry(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ChunkHit>> {
        match tokio::time::timeout(self.config.index_timeout, self.index.search(vector, k, scope))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                let halved = (k / 2).max(1);
                tracing::warn!(k, halved, "vector index timed out, retrying with halved pool");
                match tokio::time::timeout(
                    self.config.index_timeout,
                    self.index.search(vector, halved, scope),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::upstream("vector index", "timed out after retry")),
                }
            },
        }
    }
}

/// Cross-encoder backends may emit raw logits; anything outside [0, 1]
/// goes through a logistic squash so the final blend stays bounded.
fn squash(score: f32) -> f32 {
    if (0.0..=1.0).contains(&score) {
        score
    } else {
        1.0 / (1.0 + (-score).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct StubEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        fn dim(&self) -> usize {
            self.vector.len()
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct StubIndex {
        hits: Vec<ChunkHit>,
        requested_k: Mutex<Vec<usize>>,
    }

    impl StubIndex {
        fn new(hits: Vec<ChunkHit>) -> Self {
            Self {
                hits,
                requested_k: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorIndex for StubIndex {
        async fn search(
            &self,
            _vector: &[f32],
            k: usize,
            _scope: Option<&str>,
        ) -> Result<Vec<ChunkHit>> {
            self.requested_k.lock().push(k);
            Ok(self.hits.iter().take(k).cloned().collect())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct SlowIndex {
        inner: StubIndex,
        slow_calls: Mutex<usize>,
    }

    #[async_trait]
    impl VectorIndex for SlowIndex {
        async fn search(
            &self,
            vector: &[f32],
            k: usize,
            scope: Option<&str>,
        ) -> Result<Vec<ChunkHit>> {
            let should_sleep = {
                let mut slow = self.slow_calls.lock();
                if *slow > 0 {
                    *slow -= 1;
                    true
                } else {
                    false
                }
            };
            if should_sleep {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.search(vector, k, scope).await
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct StubReranker {
        scores: Option<Vec<f32>>,
    }

    #[async_trait]
    impl Reranker for StubReranker {
        async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
            match &self.scores {
                Some(scores) => Ok(scores.iter().take(passages.len()).cloned().collect()),
                None => Err(Error::upstream("reranker", "down")),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn hit(id: &str, index: u32, content: &str, score: f32) -> ChunkHit {
        ChunkHit {
            chunk_id: format!("{}#{}", id, index),
            score,
            content: content.to_string(),
            source_id: id.to_string(),
            chunk_index: index,
            metadata: HashMap::new(),
        }
    }

    fn retriever_with(
        hits: Vec<ChunkHit>,
        reranker: Option<StubReranker>,
        config: RetrieverConfig,
    ) -> Retriever {
        let mut retriever = Retriever::new(
            config,
            Arc::new(StubEmbedder {
                vector: vec![1.0, 0.0],
            }),
            Arc::new(StubIndex::new(hits)),
        );
        if let Some(r) = reranker {
            retriever = retriever.with_reranker(Arc::new(r));
        }
        retriever
    }

    #[tokio::test]
    async fn test_final_score_blend_and_order() {
        let hits = vec![
            hit("a.md", 0, "first chunk", 0.9),
            hit("b.md", 0, "second chunk", 0.5),
        ];
        let reranker = StubReranker {
            scores: Some(vec![0.2, 0.9]),
        };
        let retriever = retriever_with(hits, Some(reranker), RetrieverConfig::default());

        let query = Query::new("anything", None);
        let result = retriever.retrieve(&query).await.unwrap();

        assert_eq!(result.rerank_mode, RerankMode::CrossEncoder);
        // b.md: 0.3*0.5 + 0.7*0.9 = 0.78 beats a.md: 0.3*0.9 + 0.7*0.2 = 0.41
        assert_eq!(result.passages[0].source_id, "b.md");
        assert!((result.passages[0].score - 0.78).abs() < 1e-5);
        assert!((result.passages[1].score - 0.41).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_reranker_failure_uses_lexical_fallback() {
        let hits = vec![
            hit("kb.md", 0, "transaction isolation level details", 0.8),
            hit("kb.md", 1, "unrelated weather report", 0.8),
        ];
        let reranker = StubReranker { scores: None };
        let config = RetrieverConfig {
            min_final_score: 0.0,
            ..Default::default()
        };
        let retriever = retriever_with(hits, Some(reranker), config);

        let query = Query::new("transaction isolation level", None);
        let result = retriever.retrieve(&query).await.unwrap();

        assert_eq!(result.rerank_mode, RerankMode::LexicalFallback);
        assert_eq!(result.passages[0].chunk_index, 0);
        assert!(result.passages[0].score > result.passages[1].score);
    }

    #[tokio::test]
    async fn test_min_final_score_filters() {
        let hits = vec![
            hit("a.md", 0, "strong", 0.9),
            hit("b.md", 0, "weak", 0.2),
        ];
        let reranker = StubReranker {
            scores: Some(vec![0.9, 0.1]),
        };
        let retriever = retriever_with(hits, Some(reranker), RetrieverConfig::default());

        let query = Query::new("anything", None);
        let result = retriever.retrieve(&query).await.unwrap();

        // b.md final = 0.3*0.2 + 0.7*0.1 = 0.13 < 0.3
        assert_eq!(result.passages.len(), 1);
        assert_eq!(result.passages[0].source_id, "a.md");
    }

    #[tokio::test]
    async fn test_initial_pool_size() {
        let index = Arc::new(StubIndex::new(vec![]));
        let retriever = Retriever::new(
            RetrieverConfig::default(),
            Arc::new(StubEmbedder {
                vector: vec![1.0, 0.0],
            }),
            index.clone(),
        );

        let query = Query::new("anything", None);
        let result = retriever.retrieve(&query).await.unwrap();
        assert!(result.passages.is_empty());

        // top_k=7 -> max(28, 20) = 28
        assert_eq!(index.requested_k.lock().as_slice(), &[28]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_timeout_retries_with_halved_pool() {
        let inner = StubIndex::new(vec![hit("a.md", 0, "content here", 0.9)]);
        let index = Arc::new(SlowIndex {
            inner,
            slow_calls: Mutex::new(1),
        });
        let config = RetrieverConfig {
            min_final_score: 0.0,
            ..Default::default()
        };
        let retriever = Retriever::new(
            config,
            Arc::new(StubEmbedder {
                vector: vec![1.0, 0.0],
            }),
            index.clone(),
        );

        let query = Query::new("anything", None);
        let result = retriever.retrieve(&query).await.unwrap();

        assert_eq!(result.passages.len(), 1);
        assert_eq!(index.inner.requested_k.lock().as_slice(), &[14]);
    }

    #[tokio::test]
    async fn test_coarse_floor_drops_weak_hits() {
        let hits = vec![
            hit("a.md", 0, "kept", 0.5),
            hit("b.md", 0, "dropped", 0.05),
        ];
        let reranker = StubReranker {
            scores: Some(vec![0.9, 0.9]),
        };
        let retriever = retriever_with(hits, Some(reranker), RetrieverConfig::default());

        let query = Query::new("anything", None);
        let result = retriever.retrieve(&query).await.unwrap();
        assert_eq!(result.passages.len(), 1);
        assert_eq!(result.passages[0].source_id, "a.md");
    }

    #[test]
    fn test_squash() {
        assert_eq!(squash(0.4), 0.4);
        let squashed = squash(3.2);
        assert!((0.0..=1.0).contains(&squashed));
        assert!(squashed > 0.9);
        assert!(squash(-3.2) < 0.1);
    }
}
