//! Document ingestion infrastructure
//!
//! The pipeline turns one source document into indexed chunks; the
//! repository ingester feeds a whole cloned source tree through it.

pub mod pipeline;
pub mod repository;

pub use pipeline::{ChunkFailure, IngestResult, IngestionPipeline};
pub use repository::{
    is_supported_extension, DocumentFailure, RepositoryCredentials, RepositoryIngestResult,
    RepositoryIngester, RepositoryRequest, SUPPORTED_EXTENSIONS,
};
