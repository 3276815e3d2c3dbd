//! Sync queue domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of change a queued mutation applies upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// Mutation submitted by a client, before it is queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMutation {
    /// Entity collection, e.g. "tenders" or "contacts"
    pub entity: String,
    /// Target record; absent for creates
    #[serde(default)]
    pub entity_id: Option<String>,
    pub operation: MutationKind,
    #[serde(default)]
    pub payload: Value,
}

/// A mutation waiting to be delivered upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: Uuid,
    pub entity: String,
    pub entity_id: Option<String>,
    pub operation: MutationKind,
    pub payload: Value,
    pub queued_at: DateTime<Utc>,
    /// Failed delivery attempts so far
    pub attempts: u32,
    /// Error from the most recent failed attempt
    pub last_error: Option<String>,
}

impl QueuedMutation {
    pub fn from_new(mutation: NewMutation) -> Self {
        Self {
            id: Uuid::now_v7(),
            entity: mutation.entity,
            entity_id: mutation.entity_id,
            operation: mutation.operation,
            payload: mutation.payload,
            queued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

/// Outcome of one `sync_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Delivered and removed from the queue
    pub synced: usize,
    /// Failed but kept for another attempt
    pub failed: usize,
    /// Moved to the dead-letter list after exhausting their attempts
    pub dead_lettered: usize,
    /// Still queued after the pass
    pub remaining: usize,
    /// The pass stopped (or never started) because the upstream was unreachable
    pub offline: bool,
}

/// On-disk representation of the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub version: u32,
    pub pending: Vec<QueuedMutation>,
    pub dead_letters: Vec<QueuedMutation>,
}
