//! Error types for tile processing, persistence and the streaming session.

use std::path::PathBuf;

/// Result type for tile operations.
pub type Result<T> = std::result::Result<T, TileError>;

/// Errors raised while reading tracks or persisting tile state.
///
/// Most of these are recoverable per unit: a batch run logs them and moves on
/// to the next file. Only [`TileError::Storage`] aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[cfg(feature = "gpx")]
    #[error("GPX parsing error in {path}: {source}")]
    Gpx {
        path: PathBuf,
        source: gpx::errors::GpxError,
    },

    #[error("malformed track {path}: {reason}")]
    MalformedTrack { path: PathBuf, reason: String },

    /// An output file or directory cannot be created or written; the run
    /// cannot continue.
    #[error("storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TileError {
    /// Whether a batch run may skip the offending unit and continue.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TileError::Storage { .. })
    }
}

/// Protocol misuse of a [`StreamingSession`](crate::StreamingSession).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("next called before init")]
    NotInitialized,
}
