use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::queue_worker::{sync_request_worker, SyncWorkerDeps};

/// Why a sync pass was asked for; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    MutationQueued,
    Manual,
}

/// Entry point for scheduling background sync passes.
///
/// Created with [`new`](Self::new) before the queue and transport exist, then
/// wired up with [`start_worker`](Self::start_worker). Requests sent in between
/// are buffered.
pub struct SyncRequestSink {
    tx: mpsc::UnboundedSender<SyncRequest>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<SyncRequest>>>,
}

impl SyncRequestSink {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Spawns the worker. Returns `false` if it was already started.
    pub fn start_worker(&self, deps: Arc<SyncWorkerDeps>, debounce: Duration) -> bool {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(rx) = rx else {
            tracing::warn!("Sync worker already started");
            return false;
        };
        tokio::spawn(sync_request_worker(rx, deps, debounce));
        true
    }

    pub fn request(&self, reason: SyncRequest) {
        if let Err(e) = self.tx.send(reason) {
            tracing::warn!("Failed to schedule sync: {}", e);
        }
    }

    #[cfg(test)]
    pub(crate) fn with_sender(tx: mpsc::UnboundedSender<SyncRequest>) -> Self {
        Self {
            tx,
            rx: Mutex::new(None),
        }
    }
}

impl Default for SyncRequestSink {
    fn default() -> Self {
        Self::new()
    }
}
