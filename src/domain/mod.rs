//! Domain layer - Core entities, provider traits, and validation

pub mod chunking;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod registry;

pub use chunking::{chunk_text, ChunkingConfig, SeparatorClass, TextChunk};
pub use document::{DocumentOrigin, SourceDocument};
pub use embedding::EmbeddingProvider;
pub use error::DomainError;
pub use generation::GenerationProvider;
pub use index::{cosine_similarity, IndexEntry, Provenance, ScoredEntry, VectorIndex};
pub use registry::{validate_kb_name, KbName, MAX_KB_NAME_LENGTH};
