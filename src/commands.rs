//! Inbound command surface.
//!
//! Thin request/response wrappers over the store and the deployment
//! controller. Every command logs its failure before handing the typed
//! error back to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::{local, ArchiveEngine};
use crate::config::PackFormat;
use crate::domain::{ContentType, Metadata, Platform, PlatformKind, Tag};
use crate::library::{Catalog, CatalogFile, DeploymentController, Library, LibraryError, Result};

/// Platform as supplied by a caller, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(default)]
    pub kind: PlatformKind,

    /// Storefront id for Steam/DLSite, free-form name for Other
    #[serde(default)]
    pub id: Option<String>,
}

impl PlatformInfo {
    pub fn new(kind: PlatformKind, id: Option<String>) -> Self {
        Self { kind, id }
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    fn apply(&self, record: &mut Metadata) {
        match self.kind {
            PlatformKind::Other => {
                record.platform = Platform::normalize(self.kind, self.id().map(str::to_string));
            }
            kind => {
                record.platform = Platform::normalize(kind, None);
                record.platform_id = self.id().map(str::to_string);
            }
        }
    }
}

/// Catalog an archive that already exists on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryRequest {
    pub title: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub platform: PlatformInfo,
    #[serde(default)]
    pub archive_path: Option<String>,
    #[serde(default)]
    pub archive_password: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Pack a directory into a new archive and catalog it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub source: PathBuf,
    pub title: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub platform: PlatformInfo,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Command handlers bound to one library
pub struct LibraryCommands {
    library: Arc<Library>,
    deployer: DeploymentController,
    archive_dir: PathBuf,
    pack_format: PackFormat,
}

impl LibraryCommands {
    pub fn new(library: Arc<Library>, engine: Arc<dyn ArchiveEngine>, archive_dir: PathBuf) -> Self {
        Self {
            deployer: DeploymentController::new(library.clone(), engine),
            library,
            archive_dir,
            pack_format: PackFormat::default(),
        }
    }

    pub fn with_pack_format(mut self, pack_format: PackFormat) -> Self {
        self.pack_format = pack_format;
        self
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub async fn library_get(&self) -> Catalog {
        self.library.get_all().await
    }

    pub async fn library_reload(&self) -> Result<Catalog> {
        logged("reload", self.library.reload().await)
    }

    pub async fn library_add(&self, record: Metadata) -> Result<Metadata> {
        logged("add", self.library.add(record).await)
    }

    /// Catalog an existing archive, measuring it when it is reachable
    pub async fn library_add_entry(&self, request: EntryRequest) -> Result<Metadata> {
        let mut record = Metadata::new(request.title)
            .with_content_type(request.content_type)
            .with_tags(request.tags);
        request.platform.apply(&mut record);
        record.archive_path = request.archive_path.filter(|p| !p.is_empty());
        record.archive_password = request.archive_password.filter(|p| !p.is_empty());

        if let Some(archive) = record.archive_path.clone() {
            record.size_bytes = measure(Path::new(&archive)).await;
        }

        logged("add", self.library.add(record).await)
    }

    /// Pack `request.source` under the archive directory, then catalog it
    pub async fn library_create(&self, request: ArchiveRequest) -> Result<Metadata> {
        logged("create", self.create(request).await)
    }

    async fn create(&self, request: ArchiveRequest) -> Result<Metadata> {
        let archive = self.archive_path_for(&request.platform);
        let password = request.password.filter(|p| !p.is_empty());

        self.deployer
            .engine()
            .pack(&request.source, &archive, password.as_deref())
            .await
            .map_err(|e| {
                LibraryError::io(
                    format!(
                        "Failed to pack {} into {}",
                        request.source.display(),
                        archive.display()
                    ),
                    e,
                )
            })?;
        info!("Created archive {}", archive.display());

        let mut record = Metadata::new(request.title)
            .with_content_type(request.content_type)
            .with_tags(request.tags)
            .with_archive(archive.to_string_lossy());
        request.platform.apply(&mut record);
        record.archive_password = password;
        record.size_bytes = measure(&archive).await;

        match self.library.add(record).await {
            Ok(added) => Ok(added),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&archive).await {
                    warn!("Failed to remove orphaned archive {}: {}", archive.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    /// `<archive_dir>/<platform>/<platform id>.<ext>` for storefront items,
    /// `<archive_dir>/<source name>/ANONYMOUS-<timestamp>-<token>.<ext>` for
    /// Other. Items without an id are always anonymous.
    fn archive_path_for(&self, platform: &PlatformInfo) -> PathBuf {
        let (dir, stem) = match (platform.kind, platform.id()) {
            (PlatformKind::Other, name) => (
                name.map(sanitize)
                    .filter(|name| name.chars().any(|c| c != '.'))
                    .unwrap_or_else(|| platform.kind.to_string()),
                anonymous_stem(),
            ),
            (kind, Some(id)) => (kind.to_string(), sanitize(id)),
            (kind, None) => (kind.to_string(), anonymous_stem()),
        };
        self.archive_dir
            .join(dir)
            .join(format!("{}.{}", stem, self.pack_format.extension()))
    }

    pub async fn library_replace(&self, record: Metadata) -> Result<Metadata> {
        logged("replace", self.library.replace(record).await)
    }

    pub async fn library_del(&self, id: &str) -> Result<bool> {
        logged("delete", self.library.delete(id).await)
    }

    pub async fn library_deploy(&self, id: &str, path: &str) -> Result<Metadata> {
        logged("deploy", self.deployer.deploy(id, path).await)
    }

    pub async fn library_deploy_off(&self, id: &str) -> Result<Metadata> {
        logged("deploy_off", self.deployer.undeploy(id).await)
    }

    /// Write the whole catalog as JSON. Returns the number of entries.
    pub async fn library_export(&self, path: &Path) -> Result<usize> {
        let file = CatalogFile::from_catalog(&self.library.get_all().await);
        let result = file
            .save(path)
            .await
            .map(|()| file.entries.len())
            .map_err(|e| LibraryError::io(format!("Failed to export library to {}", path.display()), e));
        if let Ok(count) = &result {
            info!(count, "Exported library to {}", path.display());
        }
        logged("export", result)
    }

    /// Import a previous export. Returns `false` if the file does not exist.
    pub async fn library_import(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            warn!("Import file {} does not exist", path.display());
            return Ok(false);
        }

        let result = match CatalogFile::load(path).await {
            Ok(file) => self.library.import(file.entries).await.map(|_| true),
            Err(e) => Err(LibraryError::io(
                format!("Failed to read library export {}", path.display()),
                e,
            )),
        };
        logged("import", result)
    }
}

fn logged<T>(command: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!(command, "{}", e);
    }
    result
}

/// Best-effort size of an archive file or directory
async fn measure(path: &Path) -> Option<u64> {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || local::measure(&owned)).await {
        Ok(Ok(size)) => Some(size),
        Ok(Err(e)) => {
            warn!("Could not measure {}: {}", path.display(), e);
            None
        }
        Err(e) => {
            warn!("Measuring {} panicked: {}", path.display(), e);
            None
        }
    }
}

/// Unique per call, even within the same second
fn anonymous_stem() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "ANONYMOUS-{}-{}",
        Local::now().format("%Y%m%d-%H%M%S"),
        &token[..8]
    )
}

/// Keep a platform id usable as a file name
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
