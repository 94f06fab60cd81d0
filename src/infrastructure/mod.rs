//! Infrastructure layer - Storage, providers, and orchestration

pub mod http_client;
pub mod index;
pub mod ingestion;
pub mod logging;
pub mod providers;
pub mod query;
pub mod registry;

pub use http_client::{HttpClient, HttpClientTrait};
pub use index::FileVectorIndex;
pub use ingestion::{
    is_supported_extension, ChunkFailure, DocumentFailure, IngestResult, IngestionPipeline,
    RepositoryCredentials, RepositoryIngestResult, RepositoryIngester, RepositoryRequest,
    SUPPORTED_EXTENSIONS,
};
pub use providers::{OpenAiCompatEmbeddingProvider, OpenAiCompatGenerationProvider};
pub use query::{Answer, QueryEngine, QueryOptions, SourceRef};
pub use registry::{KbHandle, KnowledgeBaseRegistry};
