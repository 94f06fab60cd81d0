//! Vector index entries and the per-knowledge-base index trait

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::chunking::TextChunk;
use crate::domain::document::SourceDocument;
use crate::domain::DomainError;

/// Provenance metadata carried by every index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Identifier of the source document (name or path)
    pub document_id: String,
    /// Rendered origin ("upload" or "repository:<url>@<ref>:<path>")
    pub origin: String,
    /// Sequence index of the chunk within its document
    pub chunk_index: usize,
    /// Character offset of the chunk within its document
    pub char_start: usize,
    /// Chunk length in characters
    pub char_len: usize,
}

/// The unit persisted and searched: one embedded chunk
///
/// One-to-one with a chunk whose embedding succeeded; a chunk whose
/// embedding call failed is never turned into an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Freshly generated identifier
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Chunk text
    pub content: String,
    /// Where the chunk came from
    pub provenance: Provenance,
}

impl IndexEntry {
    /// Build an entry from a chunk, its vector, and the owning document
    pub fn from_chunk(chunk: &TextChunk, vector: Vec<f32>, document: &SourceDocument) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            content: chunk.content.clone(),
            provenance: Provenance {
                document_id: document.name.clone(),
                origin: document.origin_string(),
                chunk_index: chunk.index,
                char_start: chunk.char_start,
                char_len: chunk.char_len,
            },
        }
    }
}

/// An index entry paired with its similarity to a query vector
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    /// Cosine similarity, higher is more similar
    pub score: f32,
}

/// Cosine similarity between two vectors of equal length
///
/// Zero-magnitude vectors score 0.0 rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Per-knowledge-base persistent vector index
///
/// Implementations own their storage exclusively; no other component
/// touches it. Batches are all-or-nothing: a failed `upsert` leaves the
/// index exactly as it was, and readers never observe a batch mid-flight.
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug {
    /// Append a batch of entries; all-or-nothing per batch
    ///
    /// Callers pass one source document's chunks per batch so that a
    /// failing document cannot corrupt a sibling document's entries.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, DomainError>;

    /// Return the `top_k` entries most similar to the query vector,
    /// ordered by descending similarity, ties broken by insertion order
    /// (earlier-inserted wins). `top_k` is clamped to the entry count.
    ///
    /// Searching an empty index returns an empty vector, never an error.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>, DomainError>;

    /// Remove all entries; used exclusively by knowledge base deletion
    async fn clear(&self) -> Result<(), DomainError>;

    /// Number of entries currently indexed
    async fn entry_count(&self) -> usize;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    /// In-memory vector index for tests, with a switchable failure mode
    #[derive(Debug, Default)]
    pub struct MockVectorIndex {
        entries: RwLock<Vec<IndexEntry>>,
        fail_upserts: AtomicBool,
    }

    impl MockVectorIndex {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent upsert fail with a storage error
        pub fn fail_upserts(&self, fail: bool) {
            self.fail_upserts.store(fail, Ordering::SeqCst);
        }

        pub async fn entries(&self) -> Vec<IndexEntry> {
            self.entries.read().await.clone()
        }
    }

    #[async_trait]
    impl VectorIndex for MockVectorIndex {
        async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, DomainError> {
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(DomainError::storage("mock index configured to fail"));
            }

            let count = entries.len();
            self.entries.write().await.extend(entries);
            Ok(count)
        }

        async fn search(
            &self,
            query: &[f32],
            top_k: usize,
        ) -> Result<Vec<ScoredEntry>, DomainError> {
            let entries = self.entries.read().await;

            let mut scored: Vec<ScoredEntry> = entries
                .iter()
                .map(|entry| ScoredEntry {
                    score: cosine_similarity(query, &entry.vector),
                    entry: entry.clone(),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(top_k);

            Ok(scored)
        }

        async fn clear(&self) -> Result<(), DomainError> {
            self.entries.write().await.clear();
            Ok(())
        }

        async fn entry_count(&self) -> usize {
            self.entries.read().await.len()
        }
    }
}
