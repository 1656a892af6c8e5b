//! Error types for the ingest pipeline.

use thiserror::Error;

/// Errors that can occur while starting or finishing an ingest stream.
///
/// Per-step failures (extraction, embedding) never surface here; they are
/// logged and the stream continues.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Upload id unknown or already consumed by a previous stream.
    #[error("upload not found: {0}")]
    UploadNotFound(String),

    /// World-store or shard persistence failure.
    #[error(transparent)]
    World(#[from] lorekeep_world::WorldError),
}

/// Result type alias for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
