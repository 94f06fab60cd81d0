//! Ingestion pipeline: chunk, embed, batch-upsert
//!
//! Failure policy is two-tier. Embedding failures are per-chunk: the failed
//! chunk is recorded and dropped while its siblings continue. Storage
//! failures are systemic: the whole document's batch is aborted and nothing
//! of it is persisted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::chunking::{chunk_text, ChunkingConfig};
use crate::domain::document::SourceDocument;
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::index::{IndexEntry, VectorIndex};
use crate::domain::DomainError;
use crate::infrastructure::registry::KbHandle;

/// One chunk that could not be embedded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// Sequence index of the chunk within its document
    pub chunk_index: usize,
    /// Failure reason
    pub message: String,
}

/// Result of ingesting a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    /// Identifier of the ingested document
    pub document_id: String,
    /// Number of chunks persisted to the index
    pub chunks_added: usize,
    /// Chunks dropped because their embedding call failed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ChunkFailure>,
}

impl IngestResult {
    /// Whether every chunk of the document was persisted
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pipeline orchestrating chunker, embedding provider, and vector index
#[derive(Debug)]
pub struct IngestionPipeline<E>
where
    E: EmbeddingProvider,
{
    embedding: Arc<E>,
}

impl<E: EmbeddingProvider> IngestionPipeline<E> {
    /// Create a new ingestion pipeline
    pub fn new(embedding: Arc<E>) -> Self {
        Self { embedding }
    }

    /// Ingest one document into a knowledge base
    ///
    /// Documents are immutable once ingested: re-ingesting the same payload
    /// appends fresh chunks, it does not replace the old ones.
    pub async fn ingest(
        &self,
        kb: &KbHandle,
        document: SourceDocument,
        config: &ChunkingConfig,
    ) -> Result<IngestResult, DomainError> {
        let chunks = chunk_text(&document.text, config)?;

        if chunks.is_empty() {
            return Ok(IngestResult {
                document_id: document.name,
                chunks_added: 0,
                failures: Vec::new(),
            });
        }

        let mut entries = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for chunk in &chunks {
            match self.embedding.embed(&chunk.content).await {
                Ok(vector) => entries.push(IndexEntry::from_chunk(chunk, vector, &document)),
                Err(e) => {
                    warn!(
                        kb = %kb.name(),
                        document = %document.name,
                        chunk = chunk.index,
                        error = %e,
                        "embedding failed, dropping chunk"
                    );
                    failures.push(ChunkFailure {
                        chunk_index: chunk.index,
                        message: e.to_string(),
                    });
                }
            }
        }

        let chunks_added = if entries.is_empty() {
            0
        } else {
            // One document per batch; the exclusive-writer lock is held
            // only around the upsert itself, never around embedding calls.
            let _write = kb.write_lock().lock().await;
            kb.index().upsert(entries).await?
        };

        debug!(
            kb = %kb.name(),
            document = %document.name,
            chunks_added,
            chunks_failed = failures.len(),
            "document ingested"
        );

        Ok(IngestResult {
            document_id: document.name,
            chunks_added,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::mock::MockEmbeddingProvider;
    use crate::domain::index::mock::MockVectorIndex;
    use crate::domain::KbName;

    fn handle_with_index(index: Arc<MockVectorIndex>) -> KbHandle {
        KbHandle::new(KbName::new("test-kb").unwrap(), index)
    }

    #[tokio::test]
    async fn test_ingest_simple_document() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let pipeline = IngestionPipeline::new(Arc::new(MockEmbeddingProvider::new(16)));

        let doc = SourceDocument::from_upload("notes.txt", "Hello, World!");
        let result = pipeline
            .ingest(&kb, doc, &ChunkingConfig::new(100, 20))
            .await
            .unwrap();

        assert_eq!(result.document_id, "notes.txt");
        assert_eq!(result.chunks_added, 1);
        assert!(result.is_complete());
        assert_eq!(index.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_empty_document() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let pipeline = IngestionPipeline::new(Arc::new(MockEmbeddingProvider::new(16)));

        let doc = SourceDocument::from_upload("empty.txt", "");
        let result = pipeline
            .ingest(&kb, doc, &ChunkingConfig::new(100, 20))
            .await
            .unwrap();

        assert_eq!(result.chunks_added, 0);
        assert!(result.is_complete());
        assert_eq!(index.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_ingest_multi_chunk_document() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let pipeline = IngestionPipeline::new(Arc::new(MockEmbeddingProvider::new(16)));

        let text = "This is a test sentence. ".repeat(40);
        let doc = SourceDocument::from_upload("long.txt", text);
        let result = pipeline
            .ingest(&kb, doc, &ChunkingConfig::new(100, 20))
            .await
            .unwrap();

        assert!(result.chunks_added > 1);
        assert_eq!(index.entry_count().await, result.chunks_added);
    }

    #[tokio::test]
    async fn test_embedding_failure_drops_only_affected_chunk() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());

        // 100 ASCII chars -> windows of 10 with stride 9. The marker sits
        // in the final window's unshared tail, so exactly one chunk fails.
        let mut text: String = (0..10).map(|i| format!("block-{:03} ", i)).collect();
        text.replace_range(92..97, "POISN");

        let config = ChunkingConfig::new(10, 1);
        let chunks = chunk_text(&text, &config).unwrap();
        let total_chunks = chunks.len();
        let poisoned: Vec<usize> = chunks
            .iter()
            .filter(|c| c.content.contains("POISN"))
            .map(|c| c.index)
            .collect();
        assert_eq!(poisoned.len(), 1);

        let embedding = Arc::new(MockEmbeddingProvider::new(16).with_failure_for("POISN"));
        let pipeline = IngestionPipeline::new(embedding);

        let doc = SourceDocument::from_upload("mixed.txt", text);
        let result = pipeline.ingest(&kb, doc, &config).await.unwrap();

        assert_eq!(result.chunks_added, total_chunks - 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].chunk_index, poisoned[0]);

        // The failed chunk was never persisted, so no search can return it.
        assert_eq!(index.entry_count().await, total_chunks - 1);
        for entry in index.entries().await {
            assert!(!entry.content.contains("POISN"));
        }
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_whole_document() {
        let index = Arc::new(MockVectorIndex::new());
        index.fail_upserts(true);
        let kb = handle_with_index(index.clone());
        let pipeline = IngestionPipeline::new(Arc::new(MockEmbeddingProvider::new(16)));

        let text = "word ".repeat(100);
        let doc = SourceDocument::from_upload("doomed.txt", text);
        let result = pipeline.ingest(&kb, doc, &ChunkingConfig::new(50, 10)).await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert_eq!(index.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_all_embeddings_failing_persists_nothing() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let embedding = Arc::new(MockEmbeddingProvider::new(16).with_error("model offline"));
        let pipeline = IngestionPipeline::new(embedding);

        let doc = SourceDocument::from_upload("doc.txt", "some content here");
        let result = pipeline
            .ingest(&kb, doc, &ChunkingConfig::new(100, 20))
            .await
            .unwrap();

        assert_eq!(result.chunks_added, 0);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(index.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_chunking_config_rejected_before_side_effects() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let embedding = Arc::new(MockEmbeddingProvider::new(16));
        let pipeline = IngestionPipeline::new(embedding.clone());

        let doc = SourceDocument::from_upload("doc.txt", "content");
        let result = pipeline.ingest(&kb, doc, &ChunkingConfig::new(10, 10)).await;

        assert!(matches!(result, Err(DomainError::InvalidArgument { .. })));
        assert_eq!(embedding.call_count(), 0);
        assert_eq!(index.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_ingests_lose_nothing() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let pipeline = Arc::new(IngestionPipeline::new(Arc::new(
            MockEmbeddingProvider::new(16),
        )));
        let config = ChunkingConfig::new(50, 10);

        let text_a = "alpha content block. ".repeat(30);
        let text_b = "beta content block. ".repeat(30);

        let expected_a = chunk_text(&text_a, &config).unwrap().len();
        let expected_b = chunk_text(&text_b, &config).unwrap().len();

        let doc_a = SourceDocument::from_upload("a.txt", text_a);
        let doc_b = SourceDocument::from_upload("b.txt", text_b);

        let (res_a, res_b) = tokio::join!(
            pipeline.ingest(&kb, doc_a, &config),
            pipeline.ingest(&kb, doc_b, &config),
        );

        assert_eq!(res_a.unwrap().chunks_added, expected_a);
        assert_eq!(res_b.unwrap().chunks_added, expected_b);
        assert_eq!(index.entry_count().await, expected_a + expected_b);
    }

    #[tokio::test]
    async fn test_provenance_recorded_on_entries() {
        let index = Arc::new(MockVectorIndex::new());
        let kb = handle_with_index(index.clone());
        let pipeline = IngestionPipeline::new(Arc::new(MockEmbeddingProvider::new(16)));

        let doc = SourceDocument::from_repository(
            "src/lib.rs",
            "pub fn answer() -> u32 { 42 }",
            "https://example.com/org/repo.git",
            "main",
        );
        pipeline
            .ingest(&kb, doc, &ChunkingConfig::new(100, 20))
            .await
            .unwrap();

        let entries = index.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].provenance.document_id, "src/lib.rs");
        assert_eq!(
            entries[0].provenance.origin,
            "repository:https://example.com/org/repo.git@main:src/lib.rs"
        );
    }
}
