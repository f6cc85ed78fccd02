//! Error types for building and querying an index.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    PathNotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// An entry does not follow the item naming pattern.
    #[error("Do not recognize \"{name}\" as an item in {path}")]
    InvalidName { path: PathBuf, name: String },

    /// Category is not part of the index.
    #[error("Unknown category: {category}")]
    UnknownCategory { category: String },

    /// Item could not be found under its category.
    #[error("Item not found: {category}/{name}")]
    ItemNotFound {
        category: String,
        name: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Snapshot could not be encoded or decoded.
    #[error("Serialization error at {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Build was cancelled before it finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// A scan task panicked or was aborted.
    #[error("Scan task failed: {message}")]
    TaskFailed { message: String },
}

impl IndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::PathNotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error means the requested category or item does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownCategory { .. } | Self::ItemNotFound { .. })
    }
}
