//! Core error types for Tenderdesk.
//!
//! Module-specific errors (`SyncError`, `TransportError`) are folded into the
//! root `Error` so callers at the application edge can use a single type.

use thiserror::Error;

use crate::sync::{SyncError, TransportError};

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the tender CRM core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Sync operation failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enqueue_then_fail() -> Result<()> {
        Err(SyncError::AlreadyRunning)?
    }

    #[test]
    fn test_module_errors_fold_into_root() {
        let err = enqueue_then_fail().unwrap_err();
        assert!(matches!(err, Error::Sync(SyncError::AlreadyRunning)));
        assert_eq!(err.to_string(), "Sync operation failed: A sync pass is already running");

        let err: Error = TransportError::offline("no route").into();
        assert_eq!(err.to_string(), "Transport failed: Upstream unreachable: no route");
    }
}
