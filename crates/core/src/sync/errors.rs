//! Sync error types.

use thiserror::Error;

/// Result type alias for sync queue operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the sync queue itself.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another `sync_all` pass is still running.
    #[error("A sync pass is already running")]
    AlreadyRunning,

    /// Queue file could not be read or written.
    #[error("Queue storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Queue file was written by a newer build.
    #[error("Unsupported queue file version: {0}")]
    UnsupportedVersion(u32),
}

/// Errors reported by a [`MutationTransport`](super::MutationTransport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream is unreachable; the pass stops and nothing is counted as a failure.
    #[error("Upstream unreachable: {0}")]
    Offline(String),

    /// Upstream refused this mutation.
    #[error("Upstream rejected mutation ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self::Offline(message.into())
    }
}
