//! Adapter interfaces for external systems.
//!
//! The catalog never touches storage or archives directly. It goes through
//! two seams:
//! - [`Backend`]: document store keyed by record id
//! - [`ArchiveEngine`]: materializes and removes archive contents

pub mod backup;
pub mod local;
pub mod memory;
pub mod sqlite;

use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::domain::Metadata;

pub use local::LocalEngine;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Persistent store behind the catalog
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Read every stored record
    async fn load_all(&self) -> io::Result<Vec<Metadata>>;

    /// Insert or overwrite the record stored under `record.id`
    async fn save(&self, record: &Metadata) -> io::Result<()>;

    /// Remove a record; `false` if nothing was stored under `id`
    async fn delete(&self, id: &str) -> io::Result<bool>;
}

/// Engine that materializes archives on the filesystem
#[async_trait]
pub trait ArchiveEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Materialize `archive` into `target`
    async fn extract(&self, archive: &Path, password: Option<&str>, target: &Path)
        -> io::Result<()>;

    /// Remove whatever a previous `extract` put at `target`
    async fn remove(&self, target: &Path) -> io::Result<()>;

    /// Build a new archive from a directory
    async fn pack(&self, source: &Path, archive: &Path, password: Option<&str>) -> io::Result<()> {
        let _ = (source, password);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!(
                "{} cannot create archives ({})",
                self.name(),
                archive.display()
            ),
        ))
    }
}
