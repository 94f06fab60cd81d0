//! Knowledge base registry - the single source of truth for live KBs
//!
//! Constructed once at process start with an injected storage root and
//! passed by handle to every request path. The name→handle map is the only
//! process-wide shared state; its lock is scoped to registration, lookup
//! and deregistration, never held across I/O or provider calls.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::domain::index::VectorIndex;
use crate::domain::{DomainError, KbName};
use crate::infrastructure::index::FileVectorIndex;

/// Resolved handle to one knowledge base
///
/// Carries the KB's vector index plus its exclusive-writer lock. Mutating
/// operations (ingest, delete) serialize on the lock; reads go straight to
/// the index and are never blocked by one another.
#[derive(Debug, Clone)]
pub struct KbHandle {
    name: KbName,
    created_at: DateTime<Utc>,
    index: Arc<dyn VectorIndex>,
    write_lock: Arc<Mutex<()>>,
}

impl KbHandle {
    /// Build a handle around an arbitrary index implementation
    pub fn new(name: KbName, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            name,
            created_at: Utc::now(),
            index,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &KbName {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    /// Exclusive-writer lock for this knowledge base
    ///
    /// Held only around the upsert/clear critical section, never around
    /// embedding or network calls.
    pub fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }
}

#[derive(Debug, Clone)]
struct RegisteredKb {
    index: Arc<FileVectorIndex>,
    write_lock: Arc<Mutex<()>>,
}

impl RegisteredKb {
    fn handle(&self, name: &KbName) -> KbHandle {
        KbHandle {
            name: name.clone(),
            created_at: self.index.created_at(),
            index: self.index.clone(),
            write_lock: self.write_lock.clone(),
        }
    }
}

/// Registry tracking the set of live knowledge bases
#[derive(Debug)]
pub struct KnowledgeBaseRegistry {
    storage_root: PathBuf,
    kbs: RwLock<HashMap<KbName, RegisteredKb>>,
}

impl KnowledgeBaseRegistry {
    /// Open the registry over `storage_root`, recovering every knowledge
    /// base persisted by a previous run.
    ///
    /// Every mutation is persisted eagerly at its batch boundary, so there
    /// is nothing to flush on shutdown.
    pub async fn open(storage_root: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let storage_root = storage_root.into();

        tokio::fs::create_dir_all(&storage_root).await.map_err(|e| {
            DomainError::storage(format!(
                "failed to create storage root {}: {}",
                storage_root.display(),
                e
            ))
        })?;

        let mut kbs = HashMap::new();
        let mut dir = tokio::fs::read_dir(&storage_root).await.map_err(|e| {
            DomainError::storage(format!(
                "failed to scan storage root {}: {}",
                storage_root.display(),
                e
            ))
        })?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| DomainError::storage(format!("failed to scan storage root: {}", e)))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 directory");
                continue;
            };

            let name = match KbName::new(dir_name) {
                Ok(name) => name,
                Err(_) => {
                    warn!(directory = dir_name, "skipping directory with invalid name");
                    continue;
                }
            };

            // Only directories holding a snapshot are knowledge bases;
            // anything else is leftover debris.
            if !FileVectorIndex::snapshot_exists(&entry.path()).await {
                continue;
            }

            match FileVectorIndex::open(name.clone(), entry.path()).await {
                Ok(index) => {
                    kbs.insert(
                        name,
                        RegisteredKb {
                            index: Arc::new(index),
                            write_lock: Arc::new(Mutex::new(())),
                        },
                    );
                }
                Err(e) => {
                    warn!(kb = %name, error = %e, "skipping unreadable knowledge base");
                }
            }
        }

        info!(
            root = %storage_root.display(),
            count = kbs.len(),
            "knowledge base registry opened"
        );

        Ok(Self {
            storage_root,
            kbs: RwLock::new(kbs),
        })
    }

    /// Register a new, empty knowledge base
    pub async fn create(&self, name: &str) -> Result<KbHandle, DomainError> {
        let name = KbName::new(name)?;

        if self.kbs.read().await.contains_key(&name) {
            return Err(DomainError::already_exists(format!(
                "knowledge base '{}' is already registered",
                name
            )));
        }

        // Provision durable storage before registration; open() is a no-op
        // for data already on disk, so losing a create race cannot clobber
        // the winner.
        let dir = self.storage_root.join(name.as_str());
        let index = Arc::new(FileVectorIndex::open(name.clone(), dir).await?);

        let mut guard = self.kbs.write().await;
        if guard.contains_key(&name) {
            return Err(DomainError::already_exists(format!(
                "knowledge base '{}' is already registered",
                name
            )));
        }

        let record = RegisteredKb {
            index,
            write_lock: Arc::new(Mutex::new(())),
        };
        let handle = record.handle(&name);
        guard.insert(name.clone(), record);
        drop(guard);

        info!(kb = %name, "knowledge base created");
        Ok(handle)
    }

    /// List registered knowledge base names, sorted ascending
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .kbs
            .read()
            .await
            .keys()
            .map(|name| name.as_str().to_string())
            .collect();
        names.sort();
        names
    }

    /// Resolve a name to its handle
    ///
    /// The sole access path used by the ingestion pipeline and the query
    /// engine; neither touches storage directly.
    pub async fn get(&self, name: &str) -> Result<KbHandle, DomainError> {
        let (name, record) = self.resolve(name).await?;
        Ok(record.handle(&name))
    }

    /// Delete a knowledge base and durably remove everything it persisted
    pub async fn delete(&self, name: &str) -> Result<(), DomainError> {
        let (name, record) = self.resolve(name).await?;

        // Serialize against in-flight ingestion into this KB.
        let _write = record.write_lock.lock().await;

        // Re-check under the write lock: a concurrent delete may have won.
        if !self.kbs.read().await.contains_key(&name) {
            return Err(DomainError::not_found(format!(
                "knowledge base '{}' not found",
                name
            )));
        }

        // Remove persisted data first; on failure the KB stays registered
        // and intact, so registry membership and disk never disagree.
        record.index.clear().await?;
        record.index.retire();

        self.kbs.write().await.remove(&name);

        // Data is durably gone at this point; the empty directory is not a
        // knowledge base any more (no snapshot), so a failure here only
        // leaves debris behind.
        if let Err(e) = tokio::fs::remove_dir_all(record.index.dir()).await {
            warn!(kb = %name, error = %e, "failed to remove knowledge base directory");
        }

        info!(kb = %name, "knowledge base deleted");
        Ok(())
    }

    async fn resolve(&self, name: &str) -> Result<(KbName, RegisteredKb), DomainError> {
        // An invalid name can never be registered, so it resolves to the
        // same outcome as an unknown one.
        let name = KbName::new(name)
            .map_err(|_| DomainError::not_found(format!("knowledge base '{}' not found", name)))?;

        let guard = self.kbs.read().await;
        guard
            .get(&name)
            .cloned()
            .map(|record| (name.clone(), record))
            .ok_or_else(|| {
                DomainError::not_found(format!("knowledge base '{}' not found", name))
            })
    }
}
