//! Debounced background sync.
//!
//! Handlers call [`SyncRequestSink::request`] after queueing mutations; the
//! worker collapses bursts of requests into a single `sync_all` pass.

mod queue_worker;
mod sink;

pub use queue_worker::{run_sync_pass, SyncWorkerDeps};
pub use sink::{SyncRequest, SyncRequestSink};
