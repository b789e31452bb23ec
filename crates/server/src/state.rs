//! Application state
//!
//! Composes the collaborators and the pipeline once at startup from
//! configuration; every handler works against this shared context.
//! Concrete implementations are selected here, never probed at runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use docqa_agent::{
    AnswerCache, AnswerMerger, DisabledExternalAgent, HttpExternalAgent, HttpExternalAgentConfig,
    MergerConfig, QaPipeline,
};
use docqa_config::{IndexProvider, Settings};
use docqa_core::{Embedder, ExternalAgent, GeneratorRuntime, Reranker, Result, VectorIndex};
use docqa_generation::{
    CandidateGenerator, CandidateRanker, GeneratorConfig, HttpGenerator, HttpGeneratorConfig,
    RankerConfig, UnavailableGenerator,
};
use docqa_retrieval::{
    HashEmbedder, HttpCrossEncoder, HttpCrossEncoderConfig, HttpEmbedder, HttpEmbedderConfig,
    MemoryIndex, QdrantIndex, QdrantIndexConfig, Retriever, RetrieverConfig,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pipeline: Arc<QaPipeline>,
    /// Kept for readiness probing
    pub generator_runtime: Arc<dyn GeneratorRuntime>,
    /// Bounded admission queue; saturation rejects with a retryable error
    pub admission: Arc<Semaphore>,
}

impl AppState {
    /// Build the full pipeline from settings
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let embedder = build_embedder(&settings)?;
        let index = build_index(&settings)?;
        let generator_runtime = build_generator(&settings)?;
        let external = build_external(&settings)?;

        let mut retriever = Retriever::new(RetrieverConfig::from(&settings), embedder, index);
        if settings.rerank.enabled {
            retriever = retriever.with_reranker(build_reranker(&settings)?);
        }

        let generator = CandidateGenerator::new(
            Arc::clone(&generator_runtime),
            GeneratorConfig::from(&settings),
        );
        let ranker = CandidateRanker::new(RankerConfig::from(&settings));
        let merger = AnswerMerger::new(MergerConfig::from(&settings));
        let cache = Arc::new(AnswerCache::new(Duration::from_secs(
            settings.cache.ttl_seconds,
        )));

        let pipeline = Arc::new(QaPipeline::new(
            retriever, generator, ranker, merger, external, cache, &settings,
        ));

        let admission = Arc::new(Semaphore::new(settings.server.max_concurrent_requests));

        Ok(Self {
            settings: Arc::new(settings),
            pipeline,
            generator_runtime,
            admission,
        })
    }
}

fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    match settings.embedding.provider.as_str() {
        "hash" => {
            tracing::info!(dim = settings.embedding.dim, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(settings.embedding.dim)))
        },
        _ => {
            tracing::info!(
                endpoint = %settings.embedding.endpoint,
                model = %settings.embedding.model,
                "using http embedder"
            );
            Ok(Arc::new(HttpEmbedder::new(HttpEmbedderConfig {
                endpoint: settings.embedding.endpoint.clone(),
                model: settings.embedding.model.clone(),
                dim: settings.embedding.dim,
                timeout: Duration::from_millis(settings.deadlines.retrieve_ms),
            })?))
        },
    }
}

fn build_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    match settings.index.provider {
        IndexProvider::Memory => {
            tracing::info!("using in-memory vector index");
            Ok(Arc::new(MemoryIndex::new()))
        },
        IndexProvider::Qdrant => {
            tracing::info!(
                endpoint = %settings.index.endpoint,
                collection = %settings.index.collection,
                "using qdrant vector index"
            );
            Ok(Arc::new(QdrantIndex::new(QdrantIndexConfig {
                endpoint: settings.index.endpoint.clone(),
                collection: settings.index.collection.clone(),
                api_key: settings.index.api_key.clone(),
            })?))
        },
    }
}

fn build_reranker(settings: &Settings) -> Result<Arc<dyn Reranker>> {
    Ok(Arc::new(HttpCrossEncoder::new(HttpCrossEncoderConfig {
        endpoint: settings.rerank.endpoint.clone(),
        model: settings.rerank.model.clone(),
        timeout: Duration::from_millis(settings.deadlines.retrieve_ms),
    })?))
}

fn build_generator(settings: &Settings) -> Result<Arc<dyn GeneratorRuntime>> {
    match settings.generation.provider.as_str() {
        "unavailable" => {
            tracing::warn!("no generator runtime configured, responses will degrade");
            Ok(Arc::new(UnavailableGenerator))
        },
        _ => Ok(Arc::new(HttpGenerator::new(HttpGeneratorConfig {
            endpoint: settings.generation.endpoint.clone(),
            model: settings.generation.model.clone(),
            timeout: Duration::from_millis(settings.deadlines.generate_ms),
            ..Default::default()
        })?)),
    }
}

fn build_external(settings: &Settings) -> Result<Arc<dyn ExternalAgent>> {
    if settings.external.enabled {
        tracing::info!(endpoint = %settings.external.endpoint, "external agent enabled");
        Ok(Arc::new(HttpExternalAgent::new(HttpExternalAgentConfig {
            endpoint: settings.external.endpoint.clone(),
            api_key: settings.external.api_key.clone(),
            timeout: Duration::from_millis(settings.deadlines.external_ms),
        })?))
    } else {
        Ok(Arc::new(DisabledExternalAgent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_from_default_settings() {
        let state = AppState::from_settings(Settings::default()).unwrap();
        assert_eq!(
            state.admission.available_permits(),
            state.settings.server.max_concurrent_requests
        );
        assert!(!state.generator_runtime.model_name().is_empty());
    }

    #[test]
    fn test_hash_and_memory_providers() {
        let mut settings = Settings::default();
        settings.embedding.provider = "hash".into();
        settings.index.provider = IndexProvider::Memory;
        settings.generation.provider = "unavailable".into();
        assert!(AppState::from_settings(settings).is_ok());
    }
}
