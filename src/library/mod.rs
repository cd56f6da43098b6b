//! The media library: catalog store and deployment controller.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.mediashelf/
//! └── data/
//!     ├── library.db            # One JSON document per record
//!     ├── library.lock          # Held while a process owns the library
//!     ├── backup/               # Rotating copies of library.db
//!     └── archive/
//!         └── <platform>/       # Archives packed by `create`
//!             └── <platform_id>.zip
//! ```

pub mod catalog;
pub mod deploy;
pub mod error;
pub mod store;

pub use catalog::{Catalog, CatalogFile};
pub use deploy::DeploymentController;
pub use error::{ErrorKind, LibraryError, Result};
pub use store::Library;
