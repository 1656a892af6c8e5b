//! Error types for session persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from snapshot import/export and the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session id has no directory on disk.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Filesystem operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// World-store failure while applying a snapshot.
    #[error(transparent)]
    World(#[from] lorekeep_world::WorldError),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
