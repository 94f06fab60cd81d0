//! File-backed vector index, one per knowledge base
//!
//! Entries live in memory behind a `RwLock` and every successful batch is
//! written to a single JSON snapshot via temp-file + atomic rename, so the
//! on-disk state is always a complete batch boundary. A failed write rolls
//! the in-memory state back, keeping the all-or-nothing upsert contract.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::index::{cosine_similarity, IndexEntry, ScoredEntry, VectorIndex};
use crate::domain::{DomainError, KbName};

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_TMP_FILE: &str = "index.json.tmp";

#[derive(Serialize)]
struct SnapshotRef<'a> {
    created_at: &'a DateTime<Utc>,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// Durable per-knowledge-base vector index
#[derive(Debug)]
pub struct FileVectorIndex {
    name: KbName,
    dir: PathBuf,
    created_at: DateTime<Utc>,
    entries: RwLock<Vec<IndexEntry>>,
    retired: AtomicBool,
}

impl FileVectorIndex {
    /// Open the index stored in `dir`, creating an empty durable snapshot
    /// if none exists yet.
    pub async fn open(name: KbName, dir: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let dir = dir.into();

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            DomainError::storage(format!(
                "failed to create index directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);

        let index = if tokio::fs::try_exists(&snapshot_path).await.unwrap_or(false) {
            let bytes = tokio::fs::read(&snapshot_path).await.map_err(|e| {
                DomainError::storage(format!(
                    "failed to read {}: {}",
                    snapshot_path.display(),
                    e
                ))
            })?;

            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                DomainError::storage(format!(
                    "corrupt index snapshot {}: {}",
                    snapshot_path.display(),
                    e
                ))
            })?;

            debug!(
                kb = %name,
                entries = snapshot.entries.len(),
                "loaded index snapshot"
            );

            Self {
                name,
                dir,
                created_at: snapshot.created_at,
                entries: RwLock::new(snapshot.entries),
                retired: AtomicBool::new(false),
            }
        } else {
            let index = Self {
                name,
                dir,
                created_at: Utc::now(),
                entries: RwLock::new(Vec::new()),
                retired: AtomicBool::new(false),
            };

            // Provision durably before anyone can observe the index.
            index.persist(&[]).await?;
            index
        };

        Ok(index)
    }

    /// Whether `dir` holds a provisioned index snapshot
    pub async fn snapshot_exists(dir: &Path) -> bool {
        tokio::fs::try_exists(dir.join(SNAPSHOT_FILE))
            .await
            .unwrap_or(false)
    }

    pub fn name(&self) -> &KbName {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Storage directory owned by this index
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Mark the index as deleted: subsequent reads and writes through
    /// still-live handles fail with `NotFound` instead of observing or
    /// resurrecting removed storage.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    fn check_live(&self) -> Result<(), DomainError> {
        if self.retired.load(Ordering::SeqCst) {
            return Err(DomainError::not_found(format!(
                "knowledge base '{}' was deleted",
                self.name
            )));
        }
        Ok(())
    }

    async fn persist(&self, entries: &[IndexEntry]) -> Result<(), DomainError> {
        let snapshot = SnapshotRef {
            created_at: &self.created_at,
            entries,
        };

        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| DomainError::storage(format!("failed to serialize index: {}", e)))?;

        let tmp_path = self.dir.join(SNAPSHOT_TMP_FILE);
        let final_path = self.dir.join(SNAPSHOT_FILE);

        tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| {
            DomainError::storage(format!("failed to write {}: {}", tmp_path.display(), e))
        })?;

        tokio::fs::rename(&tmp_path, &final_path).await.map_err(|e| {
            DomainError::storage(format!(
                "failed to commit {}: {}",
                final_path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FileVectorIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, DomainError> {
        self.check_live()?;

        if entries.is_empty() {
            return Ok(0);
        }

        let batch_len = entries.len();
        let mut guard = self.entries.write().await;
        let prev_len = guard.len();

        guard.extend(entries);

        match self.persist(&guard).await {
            Ok(()) => {
                debug!(kb = %self.name, added = batch_len, total = guard.len(), "batch persisted");
                Ok(batch_len)
            }
            Err(e) => {
                // Roll back so the failed batch leaves no trace.
                guard.truncate(prev_len);
                Err(e)
            }
        }
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>, DomainError> {
        self.check_live()?;

        let guard = self.entries.read().await;

        if guard.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(first) = guard.first() {
            if first.vector.len() != query.len() {
                return Err(DomainError::invalid_argument(format!(
                    "query vector has {} dimensions, index entries have {}",
                    query.len(),
                    first.vector.len()
                )));
            }
        }

        let mut scored: Vec<ScoredEntry> = guard
            .iter()
            .map(|entry| ScoredEntry {
                score: cosine_similarity(query, &entry.vector),
                entry: entry.clone(),
            })
            .collect();

        // Stable sort: equal scores keep insertion order, earlier wins.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k.min(guard.len()));

        Ok(scored)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let mut guard = self.entries.write().await;
        let previous = std::mem::take(&mut *guard);

        match tokio::fs::remove_file(self.dir.join(SNAPSHOT_FILE)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                *guard = previous;
                Err(DomainError::storage(format!(
                    "failed to remove index snapshot: {}",
                    e
                )))
            }
        }
    }

    async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::SourceDocument;
    use crate::domain::TextChunk;

    fn entry(content: &str, vector: Vec<f32>, chunk_index: usize) -> IndexEntry {
        let doc = SourceDocument::from_upload("doc.txt", "irrelevant");
        let chunk = TextChunk {
            content: content.to_string(),
            index: chunk_index,
            char_start: 0,
            char_len: content.chars().count(),
        };
        IndexEntry::from_chunk(&chunk, vector, &doc)
    }

    async fn open_index(dir: &Path) -> FileVectorIndex {
        FileVectorIndex::open(KbName::new("test-kb").unwrap(), dir.join("test-kb"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        index
            .upsert(vec![
                entry("north", vec![1.0, 0.0], 0),
                entry("east", vec![0.0, 1.0], 1),
                entry("northeast", vec![0.7, 0.7], 2),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.content, "north");
        assert_eq!(results[1].entry.content, "northeast");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_empty_search_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        let results = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_clamped_to_entry_count() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        index
            .upsert(vec![entry("only", vec![1.0, 0.0], 0)])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 100).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_ties_broken_by_insertion_order() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        // Identical vectors, so identical scores.
        index
            .upsert(vec![
                entry("first", vec![1.0, 0.0], 0),
                entry("second", vec![1.0, 0.0], 1),
                entry("third", vec![1.0, 0.0], 2),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).await.unwrap();

        assert_eq!(results[0].entry.content, "first");
        assert_eq!(results[1].entry.content, "second");
        assert_eq!(results[2].entry.content, "third");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        index
            .upsert(vec![entry("a", vec![1.0, 0.0, 0.0], 0)])
            .await
            .unwrap();

        let result = index.search(&[1.0, 0.0], 1).await;
        assert!(matches!(result, Err(DomainError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        {
            let index = open_index(tmp.path()).await;
            index
                .upsert(vec![
                    entry("persisted", vec![1.0, 0.0], 0),
                    entry("also persisted", vec![0.0, 1.0], 1),
                ])
                .await
                .unwrap();
        }

        let reopened = open_index(tmp.path()).await;
        assert_eq!(reopened.entry_count().await, 2);

        let results = reopened.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].entry.content, "persisted");
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        index
            .upsert(vec![entry("gone soon", vec![1.0], 0)])
            .await
            .unwrap();
        index.clear().await.unwrap();

        assert_eq!(index.entry_count().await, 0);
        assert!(!FileVectorIndex::snapshot_exists(index.dir()).await);
    }

    #[tokio::test]
    async fn test_retired_index_rejects_access() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        index.retire();

        let search = index.search(&[1.0], 1).await;
        assert!(matches!(search, Err(DomainError::NotFound { .. })));

        let upsert = index.upsert(vec![entry("late", vec![1.0], 0)]).await;
        assert!(matches!(upsert, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        assert_eq!(index.upsert(Vec::new()).await.unwrap(), 0);
        assert_eq!(index.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_open_provisions_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let index = open_index(tmp.path()).await;

        assert!(FileVectorIndex::snapshot_exists(index.dir()).await);
    }
}
