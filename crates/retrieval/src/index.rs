//! Vector index backends
//!
//! `QdrantIndex` reads a Qdrant collection owned by the ingestion
//! pipeline; `MemoryIndex` is an in-process inner-product scan used in
//! tests and for small corpora. Both are read-only from the pipeline's
//! perspective (the memory index exposes `insert` for fixtures).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use qdrant_client::{
    qdrant::{
        condition::ConditionOneOf, r#match::MatchValue, value::Kind, Condition, FieldCondition,
        Filter, Match, SearchPointsBuilder,
    },
    Qdrant,
};

use docqa_core::{ChunkHit, Error, Result, VectorIndex};

/// Qdrant index configuration
#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    pub endpoint: String,
    pub collection: String,
    pub api_key: Option<String>,
}

impl Default for QdrantIndexConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:6334".to_string(),
            collection: "document_chunks".to_string(),
            api_key: None,
        }
    }
}

/// Dense index backed by Qdrant
pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantIndexConfig,
}

impl QdrantIndex {
    pub fn new(config: QdrantIndexConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| Error::upstream("vector index", e.to_string()))?;
        Ok(Self { client, config })
    }

    fn scope_filter(scope: &str) -> Filter {
        Filter {
            must: vec![Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: "source_id".to_string(),
                    r#match: Some(Match {
                        match_value: Some(MatchValue::Keyword(scope.to_string())),
                    }),
                    ..Default::default()
                })),
            }],
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ChunkHit>> {
        let mut builder =
            SearchPointsBuilder::new(&self.config.collection, vector.to_vec(), k as u64)
                .with_payload(true);

        if let Some(scope) = scope {
            builder = builder.filter(Self::scope_filter(scope));
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::upstream("vector index", e.to_string()))?;

        let hits = response
            .result
            .into_iter()
            .map(|point| {
                let mut content = String::new();
                let mut source_id = String::new();
                let mut chunk_index = 0u32;
                let mut metadata = HashMap::new();

                for (key, value) in point.payload {
                    match (key.as_str(), value.kind) {
                        ("text", Some(Kind::StringValue(s))) => content = s,
                        ("source_id", Some(Kind::StringValue(s))) => source_id = s,
                        ("chunk_index", Some(Kind::IntegerValue(n))) => chunk_index = n as u32,
                        (_, Some(Kind::StringValue(s))) => {
                            metadata.insert(key, s);
                        },
                        _ => {},
                    }
                }

                let chunk_id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        },
                        None => String::new(),
                    })
                    .unwrap_or_default();

                ChunkHit {
                    chunk_id,
                    score: point.score,
                    content,
                    source_id,
                    chunk_index,
                    metadata,
                }
            })
            .collect();

        Ok(hits)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

/// One stored chunk in the memory index
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub source_id: String,
    pub chunk_index: u32,
    pub metadata: HashMap<String, String>,
}

/// In-process inner-product index
#[derive(Default)]
pub struct MemoryIndex {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, chunk: StoredChunk) {
        self.chunks.write().push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ChunkHit>> {
        let chunks = self.chunks.read();

        let mut scored: Vec<ChunkHit> = chunks
            .iter()
            .filter(|c| scope.map_or(true, |s| c.source_id == s))
            .map(|c| ChunkHit {
                chunk_id: c.chunk_id.clone(),
                score: dot(vector, &c.vector),
                content: c.content.clone(),
                source_id: c.source_id.clone(),
                chunk_index: c.chunk_index,
                metadata: c.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
