//! mediashelf - catalog and deployment manager for media archives
//!
//! Keeps a catalog of user-owned archives (games, comics, novels, music,
//! anime) with per-entry metadata, and deploys them: an archive is
//! materialized at a chosen directory and can later be retracted again.
//!
//! # Architecture
//!
//! - `domain`: Data structures (Metadata, Platform, Tag)
//! - `library`: Catalog store, snapshots and the deployment state machine
//! - `adapters`: Storage backends and archive engines
//! - `commands`: Request/response surface used by front ends
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Catalog an archive
//! mediashelf add "Hollow Knight" --archive ~/archives/hk.zip --platform steam --platform-id 367520
//!
//! # Deploy it and take it back down
//! mediashelf deploy <id> ~/games/hollow-knight
//! mediashelf undeploy <id>
//! ```

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{ArchiveEngine, Backend, LocalEngine, MemoryBackend, SqliteBackend};
pub use commands::LibraryCommands;
pub use domain::{ContentType, DeploymentState, Metadata, Platform, PlatformKind, Tag};
pub use library::{Catalog, DeploymentController, ErrorKind, Library, LibraryError};
