//! Error types for bucketstore

use crate::context::CancellationReason;
use thiserror::Error;

/// Result type alias for bucketstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bucket operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Path escapes base directory: {0}")]
    PathEscape(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(CancellationReason),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Remote error: {0}")]
    Remote(String),
}

impl Error {
    /// True for missing objects, including names that resolve to directories
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True when a name or its resolved path leaves the base directory
    pub fn is_path_escape(&self) -> bool {
        matches!(self, Error::PathEscape(_))
    }

    /// Map an I/O error, turning `NotFound` kinds into [`Error::NotFound`]
    pub(crate) fn from_io(err: std::io::Error, name: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(name.to_string())
        } else {
            Error::Io(err)
        }
    }
}
