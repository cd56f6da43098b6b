//! The catalog store: owner of every record.
//!
//! All mutations go through one exclusive lock over the in-memory map and
//! are written to the backend *before* the map changes, so a failed write
//! never leaves the snapshot ahead of storage. Reads take the shared side
//! of the lock and hand out clones.
//!
//! Ids with a deployment transition in flight are tracked in a transient
//! pending set. While an id is pending it cannot be replaced, deleted,
//! re-imported or transitioned again.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::catalog::Catalog;
use super::error::{LibraryError, Result};
use crate::adapters::Backend;
use crate::domain::Metadata;

/// The library catalog backed by a persistent store
pub struct Library {
    backend: Arc<dyn Backend>,
    entries: RwLock<HashMap<String, Metadata>>,
    pending: Mutex<HashSet<String>>,
}

impl Library {
    /// Load every record from `backend`
    pub async fn open(backend: Arc<dyn Backend>) -> Result<Self> {
        let entries = Self::read_backend(backend.as_ref()).await?;
        info!(
            backend = backend.name(),
            count = entries.len(),
            "Library opened"
        );

        Ok(Self {
            backend,
            entries: RwLock::new(entries),
            pending: Mutex::new(HashSet::new()),
        })
    }

    async fn read_backend(backend: &dyn Backend) -> Result<HashMap<String, Metadata>> {
        let records = backend
            .load_all()
            .await
            .map_err(|e| LibraryError::io(format!("Failed to load library from {}", backend.name()), e))?;

        let mut entries = HashMap::with_capacity(records.len());
        for mut record in records {
            if let Err(e) = record.validate() {
                warn!(id = %record.id, "Stored record fails validation: {}", e);
            }
            record.sync_platform_id();
            entries.insert(record.id.clone(), record);
        }
        Ok(entries)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Snapshot of the whole catalog
    pub async fn get_all(&self) -> Catalog {
        Catalog::from_map(self.entries.read().await.clone())
    }

    pub async fn get(&self, id: &str) -> Result<Metadata> {
        self.entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }

    /// Insert a new record, assigning an id when it has none
    pub async fn add(&self, mut record: Metadata) -> Result<Metadata> {
        let mut entries = self.entries.write().await;

        if record.id.is_empty() {
            record.id = Metadata::generate_id();
        } else if entries.contains_key(&record.id) {
            warn!(id = %record.id, "Refusing to add duplicate id");
            return Err(LibraryError::DuplicateId(record.id));
        }

        record.sync_platform_id();
        record.validate()?;

        let now = Utc::now();
        record.date_created = now;
        record.date_updated = now;

        self.persist(&record).await?;
        entries.insert(record.id.clone(), record.clone());

        info!(id = %record.id, title = %record.title, "Added metadata");
        Ok(record)
    }

    /// Overwrite an existing record. `date_created` is kept from the stored
    /// copy and `date_updated` is bumped.
    pub async fn replace(&self, mut record: Metadata) -> Result<Metadata> {
        let mut entries = self.entries.write().await;

        let existing = entries
            .get(&record.id)
            .ok_or_else(|| LibraryError::NotFound(record.id.clone()))?;
        self.ensure_idle(&record.id)?;

        record.date_created = existing.date_created;
        record.sync_platform_id();
        record.validate()?;
        record.mark_updated();

        self.persist(&record).await?;
        entries.insert(record.id.clone(), record.clone());

        info!(id = %record.id, "Replaced metadata");
        Ok(record)
    }

    /// Remove a record. Returns `false` if nothing was stored under `id`.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(id) {
            debug!(id, "Delete of unknown id");
            return Ok(false);
        }
        self.ensure_idle(id)?;

        self.backend
            .delete(id)
            .await
            .map_err(|e| LibraryError::io(format!("Failed to delete metadata {}", id), e))?;
        entries.remove(id);

        info!(id, "Deleted metadata");
        Ok(true)
    }

    /// Re-read the backend and swap the snapshot. On failure the current
    /// snapshot stays in place.
    pub async fn reload(&self) -> Result<Catalog> {
        let mut entries = self.entries.write().await;

        let fresh = Self::read_backend(self.backend.as_ref()).await?;
        *entries = fresh;

        info!(count = entries.len(), "Library reloaded");
        Ok(Catalog::from_map(entries.clone()))
    }

    /// Upsert a batch of records as-is (timestamps included).
    ///
    /// Every record is validated before anything is written.
    pub async fn import(&self, records: Vec<Metadata>) -> Result<usize> {
        let mut entries = self.entries.write().await;

        let mut prepared = Vec::with_capacity(records.len());
        for mut record in records {
            record.sync_platform_id();
            record.validate()?;
            self.ensure_idle(&record.id)?;
            prepared.push(record);
        }

        let count = prepared.len();
        for record in prepared {
            self.persist(&record).await?;
            entries.insert(record.id.clone(), record);
        }

        info!(count, "Imported metadata");
        Ok(count)
    }

    /// Mark `id` as in transition and return its current state.
    ///
    /// The marker is cleared when the returned guard drops.
    pub(crate) async fn begin_transition(&self, id: &str) -> Result<(Metadata, PendingGuard<'_>)> {
        let entries = self.entries.write().await;

        let record = entries
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;

        if !self.pending().insert(id.to_string()) {
            warn!(id, "Deployment already in progress");
            return Err(LibraryError::Busy(id.to_string()));
        }

        Ok((
            record,
            PendingGuard {
                library: self,
                id: id.to_string(),
            },
        ))
    }

    /// Record the outcome of a finished transition
    pub(crate) async fn commit_deployment(
        &self,
        id: &str,
        deployed_path: Option<String>,
    ) -> Result<Metadata> {
        let mut entries = self.entries.write().await;

        let mut record = entries
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
        record.deployed_path = deployed_path;
        record.mark_updated();

        self.persist(&record).await?;
        entries.insert(id.to_string(), record.clone());

        Ok(record)
    }

    /// Whether a transition is in flight for `id`
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending().contains(id)
    }

    fn ensure_idle(&self, id: &str) -> Result<()> {
        if self.is_pending(id) {
            warn!(id, "Record is busy with a deployment");
            return Err(LibraryError::Busy(id.to_string()));
        }
        Ok(())
    }

    async fn persist(&self, record: &Metadata) -> Result<()> {
        self.backend
            .save(record)
            .await
            .map_err(|e| LibraryError::io(format!("Failed to save metadata {}", record.id), e))
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears a pending marker on drop
pub(crate) struct PendingGuard<'a> {
    library: &'a Library,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.library.pending().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBackend;
    use crate::domain::{Platform, PlatformKind};
    use crate::library::ErrorKind;

    async fn library() -> (Arc<MemoryBackend>, Library) {
        let backend = Arc::new(MemoryBackend::new());
        let library = Library::open(backend.clone()).await.unwrap();
        (backend, library)
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_persists() {
        let (backend, library) = library().await;

        let added = library.add(Metadata::new("Foo")).await.unwrap();
        assert!(!added.id.is_empty());
        assert_eq!(added.date_created, added.date_updated);
        assert_eq!(backend.stored(&added.id), Some(added.clone()));
        assert_eq!(library.get(&added.id).await.unwrap(), added);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_and_invalid() {
        let (backend, library) = library().await;
        library.add(Metadata::new("Foo").with_id("x")).await.unwrap();

        let err = library
            .add(Metadata::new("Other").with_id("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateId);

        let err = library.add(Metadata::new("  ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(backend.len(), 1);
        assert_eq!(library.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_syncs_platform_id_for_other() {
        let (_, library) = library().await;
        let added = library
            .add(Metadata::new("Foo").with_platform(Platform::other("Booth")))
            .await
            .unwrap();
        assert_eq!(added.platform.kind(), PlatformKind::Other);
        assert_eq!(added.platform_id.as_deref(), Some("Booth"));
    }

    #[tokio::test]
    async fn test_replace_keeps_created_date() {
        let (_, library) = library().await;
        let added = library.add(Metadata::new("Foo")).await.unwrap();

        let mut changed = added.clone();
        changed.title = "Bar".to_string();
        changed.date_created = Utc::now() + chrono::Duration::days(30);
        let replaced = library.replace(changed).await.unwrap();

        assert_eq!(replaced.id, added.id);
        assert_eq!(replaced.title, "Bar");
        assert_eq!(replaced.date_created, added.date_created);
        assert!(replaced.date_updated >= added.date_updated);

        let err = library
            .replace(Metadata::new("Ghost").with_id("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_pending_blocks_mutation() {
        let (_, library) = library().await;
        let added = library.add(Metadata::new("Foo")).await.unwrap();

        let (_, guard) = library.begin_transition(&added.id).await.unwrap();
        assert!(library.is_pending(&added.id));

        let err = library.delete(&added.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
        let err = library.replace(added.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
        let err = library.begin_transition(&added.id).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Busy);

        drop(guard);
        assert!(!library.is_pending(&added.id));
        assert!(library.delete(&added.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_validates_everything_first() {
        let (backend, library) = library().await;

        let err = library
            .import(vec![Metadata::new("A").with_id("a"), Metadata::new("B")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(backend.is_empty());

        let count = library
            .import(vec![
                Metadata::new("A").with_id("a"),
                Metadata::new("B").with_id("b"),
            ])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_reload_picks_up_backend_changes() {
        let (backend, library) = library().await;
        library.add(Metadata::new("Foo").with_id("a")).await.unwrap();

        backend.put(Metadata::new("Bar").with_id("b"));
        assert_eq!(library.get_all().await.len(), 1);

        let catalog = library.reload().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("b"));
    }
}
