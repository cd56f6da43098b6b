//! Failure kinds surfaced by the catalog and the deployment controller.

use thiserror::Error;

use crate::domain::ValidationError;

/// Result alias for library operations
pub type Result<T, E = LibraryError> = std::result::Result<T, E>;

/// Errors returned by catalog and deployment operations
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Invalid metadata: {0}")]
    Validation(#[from] ValidationError),

    #[error("Metadata with id {0} already exists")]
    DuplicateId(String),

    #[error("Metadata with id {0} not found")]
    NotFound(String),

    #[error("Metadata {0} has no archive to deploy")]
    NoArchive(String),

    #[error("Metadata {id} is already deployed at {path}")]
    AlreadyDeployed { id: String, path: String },

    #[error("Metadata {0} is not deployed")]
    NotDeployed(String),

    #[error("Metadata {0} has a deployment operation in progress")]
    Busy(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Flat category of a [`LibraryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateId,
    NotFound,
    NoArchive,
    AlreadyDeployed,
    NotDeployed,
    Busy,
    Io,
}

impl LibraryError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LibraryError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::Validation(_) => ErrorKind::Validation,
            LibraryError::DuplicateId(_) => ErrorKind::DuplicateId,
            LibraryError::NotFound(_) => ErrorKind::NotFound,
            LibraryError::NoArchive(_) => ErrorKind::NoArchive,
            LibraryError::AlreadyDeployed { .. } => ErrorKind::AlreadyDeployed,
            LibraryError::NotDeployed(_) => ErrorKind::NotDeployed,
            LibraryError::Busy(_) => ErrorKind::Busy,
            LibraryError::Io { .. } => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_message() {
        let err = LibraryError::io(
            "Failed to save metadata abc",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "Failed to save metadata abc: disk full");

        let err: LibraryError = ValidationError::Empty { field: "title" }.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("title"));
    }
}
