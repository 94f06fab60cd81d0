//! Ragmill
//!
//! Knowledge-base ingestion and retrieval core:
//! - deterministic chunking of text into overlapping windows
//! - per-knowledge-base persistent vector indexes with concurrency-safe
//!   mutation
//! - repository ingestion with per-file failure isolation
//! - retrieval-augmented query assembly over external embedding and
//!   generation providers
//!
//! The crate exposes `create`/`list`/`delete`/`get` on the registry and
//! `ingest`/`ingest_repository`/`query` against resolved handles; transport
//! shaping (HTTP, CLI) is left to the caller.

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::ChunkingConfig;
use infrastructure::http_client::HttpClient;
use infrastructure::providers::{OpenAiCompatEmbeddingProvider, OpenAiCompatGenerationProvider};
use infrastructure::{IngestionPipeline, KnowledgeBaseRegistry, QueryEngine, RepositoryIngester};
use tracing::info;

/// Embedding provider used by the default wiring
pub type DefaultEmbeddingProvider = OpenAiCompatEmbeddingProvider<HttpClient>;
/// Generation provider used by the default wiring
pub type DefaultGenerationProvider = OpenAiCompatGenerationProvider<HttpClient>;

/// Fully wired engine: one registry plus the request-path services
///
/// Constructed once at process start and passed by reference to every
/// request path; there is no ambient global state.
pub struct Engine {
    pub registry: Arc<KnowledgeBaseRegistry>,
    pub ingestion: Arc<IngestionPipeline<DefaultEmbeddingProvider>>,
    pub repository: Arc<RepositoryIngester<DefaultEmbeddingProvider>>,
    pub query: Arc<QueryEngine<DefaultEmbeddingProvider, DefaultGenerationProvider>>,
    /// Chunking parameters applied to every ingested document
    pub chunking: ChunkingConfig,
}

/// Assemble the engine from configuration
pub async fn create_engine(config: &AppConfig) -> anyhow::Result<Engine> {
    config.chunking.validate()?;

    let registry = Arc::new(KnowledgeBaseRegistry::open(&config.storage.root).await?);

    let embedding = Arc::new(OpenAiCompatEmbeddingProvider::new(
        HttpClient::with_timeout(Duration::from_secs(config.embedding.timeout_secs)),
        &config.embedding.base_url,
        &config.embedding.model,
        config.embedding.api_key.clone(),
    ));

    let generation = Arc::new(OpenAiCompatGenerationProvider::new(
        HttpClient::with_timeout(Duration::from_secs(config.generation.timeout_secs)),
        &config.generation.base_url,
        &config.generation.model,
        config.generation.api_key.clone(),
    ));

    let ingestion = Arc::new(IngestionPipeline::new(embedding.clone()));

    let repository = Arc::new(RepositoryIngester::new(
        ingestion.clone(),
        Duration::from_secs(config.repository.clone_timeout_secs),
    ));

    let query = Arc::new(QueryEngine::new(
        embedding,
        generation,
        config.query.clone(),
    ));

    info!(
        storage_root = %config.storage.root,
        embedding_model = %config.embedding.model,
        generation_model = %config.generation.model,
        "engine assembled"
    );

    Ok(Engine {
        registry,
        ingestion,
        repository,
        query,
        chunking: config.chunking,
    })
}
