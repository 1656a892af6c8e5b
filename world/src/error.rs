//! Error types for the world store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in world-store and shard operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Embedding backend failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// A shard id was not found, in memory or on disk.
    #[error("shard not found: {0}")]
    ShardNotFound(String),

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
}

impl WorldError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for world operations.
pub type Result<T> = std::result::Result<T, WorldError>;
