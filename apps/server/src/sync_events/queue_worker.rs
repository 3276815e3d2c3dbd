//! Worker that turns bursts of sync requests into single passes.
//!
//! A request opens a debounce window; every further request restarts it. When
//! the window elapses without new requests the queue is flushed once. If
//! another pass (a manual flush) is still running at that point, the window is
//! opened again so mutations queued during that pass are not left behind.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tenderdesk_core::sync::{MutationTransport, SyncError, SyncQueue, SyncSummary};
use tokio::sync::mpsc;

use super::sink::SyncRequest;
use crate::events::{EventBus, ServerEvent, SYNC_COMPLETE, SYNC_ERROR, SYNC_START};

pub struct SyncWorkerDeps {
    pub queue: Arc<SyncQueue>,
    pub transport: Arc<dyn MutationTransport>,
    pub event_bus: EventBus,
}

pub(super) async fn sync_request_worker(
    mut rx: mpsc::UnboundedReceiver<SyncRequest>,
    deps: Arc<SyncWorkerDeps>,
    debounce: Duration,
) {
    tracing::info!("Sync worker started (debounce {:?})", debounce);

    let mut pending = 0usize;

    loop {
        if pending == 0 {
            match rx.recv().await {
                Some(reason) => {
                    tracing::debug!("Sync requested: {:?}", reason);
                    pending += 1;
                }
                None => break,
            }
            continue;
        }

        tokio::select! {
            request = rx.recv() => match request {
                Some(reason) => {
                    tracing::debug!("Sync requested: {:?}", reason);
                    pending += 1;
                }
                None => {
                    tracing::debug!("Flushing {} pending sync request(s) before shutdown", pending);
                    while let Err(SyncError::AlreadyRunning) = run_sync_pass(&deps).await {
                        tokio::time::sleep(debounce).await;
                    }
                    break;
                }
            },
            _ = tokio::time::sleep(debounce) => {
                tracing::debug!("Running sync for {} coalesced request(s)", pending);
                match run_sync_pass(&deps).await {
                    Err(SyncError::AlreadyRunning) => {
                        tracing::debug!("Sync pass busy, waiting another window");
                    }
                    _ => pending = 0,
                }
            }
        }
    }

    tracing::info!("Sync worker shutting down");
}

/// Runs one `sync_all` pass and reports it on the event bus.
///
/// A pass already in progress is not an error for callers that only want the
/// queue flushed eventually; it is returned without publishing anything.
pub async fn run_sync_pass(deps: &SyncWorkerDeps) -> Result<SyncSummary, SyncError> {
    if deps.queue.is_syncing() {
        tracing::debug!("Sync pass skipped: another pass is running");
        return Err(SyncError::AlreadyRunning);
    }

    deps.event_bus.publish(ServerEvent::with_payload(
        SYNC_START,
        json!({ "pending": deps.queue.len() }),
    ));

    match deps.queue.sync_all(deps.transport.as_ref()).await {
        Ok(summary) => {
            let payload = serde_json::to_value(&summary).unwrap_or_default();
            deps.event_bus
                .publish(ServerEvent::with_payload(SYNC_COMPLETE, payload));
            Ok(summary)
        }
        Err(SyncError::AlreadyRunning) => {
            tracing::debug!("Sync pass skipped: another pass started first");
            Err(SyncError::AlreadyRunning)
        }
        Err(e) => {
            tracing::error!("Sync pass failed: {}", e);
            deps.event_bus.publish(ServerEvent::with_payload(
                SYNC_ERROR,
                json!({ "message": e.to_string() }),
            ));
            Err(e)
        }
    }
}
