//! Sync transport trait.

use async_trait::async_trait;

use super::errors::TransportError;
use super::model::QueuedMutation;

/// Delivers queued mutations to the upstream service.
///
/// Implementations should return [`TransportError::Offline`] for connectivity
/// problems so the queue keeps the mutation without counting an attempt.
#[async_trait]
pub trait MutationTransport: Send + Sync {
    /// Cheap reachability check run before a pass starts.
    async fn is_available(&self) -> bool;

    async fn push(&self, mutation: &QueuedMutation) -> Result<(), TransportError>;
}
