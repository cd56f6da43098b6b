//! Deployment state machine.
//!
//! ```text
//!               deploy (engine.extract ok)
//!  Undeployed ───────────────────────────────▶ Deployed
//!      ▲                                          │
//!      └──────────────────────────────────────────┘
//!               undeploy (engine.remove ok)
//! ```
//!
//! The catalog lock is not held while the engine runs. Instead the id is
//! marked pending for the duration of the engine call; concurrent requests
//! for the same id get [`LibraryError::Busy`].

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::{LibraryError, Result};
use super::store::Library;
use crate::adapters::ArchiveEngine;
use crate::domain::{Metadata, ValidationError};

/// Drives deploy/undeploy transitions through an archive engine
pub struct DeploymentController {
    library: Arc<Library>,
    engine: Arc<dyn ArchiveEngine>,
}

impl DeploymentController {
    pub fn new(library: Arc<Library>, engine: Arc<dyn ArchiveEngine>) -> Self {
        Self { library, engine }
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn engine(&self) -> &Arc<dyn ArchiveEngine> {
        &self.engine
    }

    /// Materialize the record's archive at `target`
    pub async fn deploy(&self, id: &str, target: &str) -> Result<Metadata> {
        let (record, _pending) = self.library.begin_transition(id).await?;

        let Some(archive) = record.archive() else {
            warn!(id, "Deploy requested for record without archive");
            return Err(LibraryError::NoArchive(id.to_string()));
        };
        if let Some(path) = record.deployed_path.as_deref().filter(|p| !p.is_empty()) {
            warn!(id, path, "Record is already deployed");
            return Err(LibraryError::AlreadyDeployed {
                id: id.to_string(),
                path: path.to_string(),
            });
        }
        if target.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "deployed_path",
            }
            .into());
        }

        info!(id, archive, target, engine = self.engine.name(), "Deploying");
        self.engine
            .extract(
                Path::new(archive),
                record.archive_password.as_deref(),
                Path::new(target),
            )
            .await
            .map_err(|e| {
                warn!(id, target, "Extraction failed: {}", e);
                LibraryError::io(format!("Failed to deploy {} to {}", archive, target), e)
            })?;

        match self
            .library
            .commit_deployment(id, Some(target.to_string()))
            .await
        {
            Ok(updated) => {
                info!(id, target, "Deployed");
                Ok(updated)
            }
            Err(e) => {
                warn!(id, target, "Failed to record deployment, removing files: {}", e);
                if let Err(cleanup) = self.engine.remove(Path::new(target)).await {
                    warn!(id, target, "Cleanup after failed deploy also failed: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Remove the record's materialized files
    pub async fn undeploy(&self, id: &str) -> Result<Metadata> {
        let (record, _pending) = self.library.begin_transition(id).await?;

        let Some(path) = record.deployed_path.as_deref().filter(|p| !p.is_empty()) else {
            warn!(id, "Undeploy requested for record that is not deployed");
            return Err(LibraryError::NotDeployed(id.to_string()));
        };

        info!(id, path, engine = self.engine.name(), "Undeploying");
        self.engine.remove(Path::new(path)).await.map_err(|e| {
            warn!(id, path, "Removal failed: {}", e);
            LibraryError::io(format!("Failed to remove deployment at {}", path), e)
        })?;

        let updated = self.library.commit_deployment(id, None).await?;
        info!(id, "Undeployed");
        Ok(updated)
    }
}
