//! Offline mutation queue.
//!
//! Mutations made while the upstream is unreachable are queued locally and
//! flushed by [`SyncQueue::sync_all`] once the host signals that background
//! sync may run.
//!
//! - **Models** (`model.rs`) - queued mutations and sync summaries
//! - **Errors** (`errors.rs`) - queue and transport errors
//! - **Traits** (`traits.rs`) - the transport that delivers mutations upstream
//! - **Store** (`store.rs`) - optional JSON file persistence
//! - **Queue** (`queue.rs`) - ordering, retries and dead-lettering

mod errors;
mod model;
mod queue;
mod store;
mod traits;

#[cfg(test)]
mod tests;

pub use errors::{Result, SyncError, TransportError};
pub use model::{MutationKind, NewMutation, QueueSnapshot, QueuedMutation, SyncSummary};
pub use queue::{SyncQueue, SyncQueueConfig, DEFAULT_MAX_ATTEMPTS};
pub use store::QueueFileStore;
pub use traits::MutationTransport;
