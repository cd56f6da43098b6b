//! Domain types for the media library.
//!
//! - Platform: normalized storefront identity
//! - Metadata: the catalog entry and its validation rules

pub mod metadata;
pub mod platform;

pub use metadata::{ContentType, DeploymentState, Metadata, Tag, ValidationError};
pub use platform::{Platform, PlatformKind};
