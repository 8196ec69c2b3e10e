//! Error types for the sync engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Version conflicts are deliberately absent: a conflict is an expected
/// branch of a push, handled inline by the remote-wins policy, and never
/// surfaces as an error.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote could not be reached or the request did not complete.
    #[error("remote unavailable: {message}")]
    RemoteUnavailable {
        /// Underlying cause.
        message: String,
    },

    /// The stored credential was rejected. Surfaced to the auth layer;
    /// the engine itself never re-authenticates.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// The version ledger could not be persisted. The in-memory state is
    /// still updated; callers must not assume durability.
    #[error("failed to persist version ledger at {path:?}: {source}")]
    Persistence {
        /// Ledger file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A local file could not be read or written.
    #[error("local I/O error for {path:?}: {source}")]
    LocalIo {
        /// Affected file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A collaborator returned a malformed response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The watcher could not be started or stopped.
    #[error("watcher error: {0}")]
    Watcher(String),
}

impl SyncError {
    /// Creates a `RemoteUnavailable` error.
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `LocalIo` error.
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Creates a `Persistence` error.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the operation that produced this error can be
    /// retried without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable { .. })
    }
}

impl From<notify::Error> for SyncError {
    fn from(err: notify::Error) -> Self {
        SyncError::Watcher(err.to_string())
    }
}
