//! Tests for the offline mutation queue.

use super::*;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;

// ============================================================================
// Test transport
// ============================================================================

/// Transport whose responses are scripted per entity.
#[derive(Default)]
struct ScriptedTransport {
    offline: AtomicBool,
    responses: Mutex<HashMap<String, VecDeque<std::result::Result<(), TransportError>>>>,
    delivered: Mutex<Vec<QueuedMutation>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self::default()
    }

    fn script(&self, entity: &str, result: std::result::Result<(), TransportError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(entity.to_string())
            .or_default()
            .push_back(result);
    }

    fn delivered_entities(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.entity.clone())
            .collect()
    }
}

#[async_trait]
impl MutationTransport for ScriptedTransport {
    async fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn push(&self, mutation: &QueuedMutation) -> std::result::Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&mutation.entity)
            .and_then(|queue| queue.pop_front());
        let result = scripted.unwrap_or(Ok(()));
        if result.is_ok() {
            self.delivered.lock().unwrap().push(mutation.clone());
        }
        result
    }
}

fn mutation(entity: &str) -> NewMutation {
    NewMutation {
        entity: entity.to_string(),
        entity_id: None,
        operation: MutationKind::Create,
        payload: json!({ "title": format!("{entity} draft") }),
    }
}

fn queue_with(max_attempts: u32) -> SyncQueue {
    SyncQueue::new(SyncQueueConfig { max_attempts })
}

// ============================================================================
// Queueing
// ============================================================================

mod queueing_tests {
    use super::*;

    #[test]
    fn test_enqueue_preserves_order() {
        let queue = queue_with(3);
        assert!(queue.is_empty());

        queue.enqueue(mutation("tenders")).unwrap();
        queue.enqueue(mutation("contacts")).unwrap();
        queue.enqueue(mutation("bids")).unwrap();

        let pending: Vec<String> = queue.pending().into_iter().map(|m| m.entity).collect();
        assert_eq!(pending, vec!["tenders", "contacts", "bids"]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_enqueued_mutation_starts_clean() {
        let queue = queue_with(3);
        let queued = queue
            .enqueue(NewMutation {
                entity: "tenders".into(),
                entity_id: Some("T-1001".into()),
                operation: MutationKind::Update,
                payload: json!({ "status": "SUBMITTED" }),
            })
            .unwrap();

        assert_eq!(queued.attempts, 0);
        assert!(queued.last_error.is_none());
        assert_eq!(queued.entity_id.as_deref(), Some("T-1001"));
        assert_eq!(queued.operation, MutationKind::Update);
    }

    #[test]
    fn test_new_mutation_deserializes_without_optional_fields() {
        let parsed: NewMutation =
            serde_json::from_value(json!({ "entity": "tenders", "operation": "DELETE" })).unwrap();
        assert_eq!(parsed.operation, MutationKind::Delete);
        assert!(parsed.entity_id.is_none());
        assert!(parsed.payload.is_null());
    }
}

// ============================================================================
// Sync passes
// ============================================================================

mod sync_tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_all_flushes_in_fifo_order() {
        let queue = queue_with(3);
        for entity in ["tenders", "contacts", "bids"] {
            queue.enqueue(mutation(entity)).unwrap();
        }
        let transport = ScriptedTransport::new();

        let summary = queue.sync_all(&transport).await.unwrap();

        assert_eq!(summary.synced, 3);
        assert_eq!(summary.remaining, 0);
        assert!(!summary.offline);
        assert_eq!(
            transport.delivered_entities(),
            vec!["tenders", "contacts", "bids"]
        );
        assert!(queue.is_empty());
        assert_eq!(queue.last_summary(), Some(summary));
    }

    #[tokio::test]
    async fn test_sync_all_offline_is_noop() {
        let queue = queue_with(3);
        queue.enqueue(mutation("tenders")).unwrap();
        let transport = ScriptedTransport::new();
        transport.offline.store(true, Ordering::SeqCst);

        let summary = queue.sync_all(&transport).await.unwrap();

        assert!(summary.offline);
        assert_eq!(summary.synced, 0);
        assert_eq!(summary.remaining, 1);
        assert_eq!(queue.pending()[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_retried_later() {
        let queue = queue_with(3);
        queue.enqueue(mutation("tenders")).unwrap();
        queue.enqueue(mutation("contacts")).unwrap();
        let transport = ScriptedTransport::new();
        transport.script("tenders", Err(TransportError::rejected(409, "stale revision")));

        let first = queue.sync_all(&transport).await.unwrap();
        assert_eq!(first.synced, 1);
        assert_eq!(first.failed, 1);
        assert_eq!(first.remaining, 1);

        let pending = queue.pending();
        assert_eq!(pending[0].entity, "tenders");
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("stale revision"));

        let second = queue.sync_all(&transport).await.unwrap();
        assert_eq!(second.synced, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_mutation_is_dead_lettered() {
        let queue = queue_with(2);
        queue.enqueue(mutation("tenders")).unwrap();
        let transport = ScriptedTransport::new();
        for _ in 0..2 {
            transport.script("tenders", Err(TransportError::Other("boom".into())));
        }

        let first = queue.sync_all(&transport).await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(first.dead_lettered, 0);

        let second = queue.sync_all(&transport).await.unwrap();
        assert_eq!(second.failed, 0);
        assert_eq!(second.dead_lettered, 1);
        assert_eq!(second.remaining, 0);

        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);

        assert_eq!(queue.retry_dead_letters().unwrap(), 1);
        assert!(queue.dead_letters().is_empty());
        assert_eq!(queue.pending()[0].attempts, 0);

        let third = queue.sync_all(&transport).await.unwrap();
        assert_eq!(third.synced, 1);
    }

    #[tokio::test]
    async fn test_offline_midway_stops_without_charging_attempts() {
        let queue = queue_with(3);
        for entity in ["tenders", "contacts", "bids"] {
            queue.enqueue(mutation(entity)).unwrap();
        }
        let transport = ScriptedTransport::new();
        transport.script("contacts", Err(TransportError::offline("connection reset")));

        let summary = queue.sync_all(&transport).await.unwrap();

        assert!(summary.offline);
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.remaining, 2);
        assert!(queue.pending().iter().all(|m| m.attempts == 0));
        assert_eq!(transport.delivered_entities(), vec!["tenders"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sync_is_rejected() {
        let queue = Arc::new(queue_with(3));
        queue.enqueue(mutation("tenders")).unwrap();
        let transport = Arc::new(ScriptedTransport {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });

        let first = {
            let queue = queue.clone();
            let transport = transport.clone();
            tokio::spawn(async move { queue.sync_all(transport.as_ref()).await })
        };
        tokio::task::yield_now().await;
        assert!(queue.is_syncing());

        let second = queue.sync_all(transport.as_ref()).await;
        assert!(matches!(second, Err(SyncError::AlreadyRunning)));

        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.synced, 1);
        assert!(!queue.is_syncing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_enqueued_during_pass_wait_for_next_pass() {
        let queue = Arc::new(queue_with(3));
        queue.enqueue(mutation("tenders")).unwrap();
        let transport = Arc::new(ScriptedTransport {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });

        let pass = {
            let queue = queue.clone();
            let transport = transport.clone();
            tokio::spawn(async move { queue.sync_all(transport.as_ref()).await })
        };
        tokio::task::yield_now().await;
        queue.enqueue(mutation("contacts")).unwrap();

        let summary = pass.await.unwrap().unwrap();
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.remaining, 1);
        assert_eq!(queue.pending()[0].entity, "contacts");
    }
}

// ============================================================================
// Persistence
// ============================================================================

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync").join("queue.json");

        {
            let queue = SyncQueue::open(&path, SyncQueueConfig::default()).unwrap();
            queue.enqueue(mutation("tenders")).unwrap();
            queue.enqueue(mutation("contacts")).unwrap();

            let transport = ScriptedTransport::new();
            transport.script("tenders", Err(TransportError::rejected(500, "upstream error")));
            transport.script("contacts", Err(TransportError::rejected(500, "upstream error")));
            queue.sync_all(&transport).await.unwrap();
        }

        let reopened = SyncQueue::open(&path, SyncQueueConfig::default()).unwrap();
        let pending = reopened.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].entity, "tenders");
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[1].entity, "contacts");
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let queue = SyncQueue::open(dir.path().join("absent.json"), SyncQueueConfig::default())
            .unwrap();
        assert!(queue.is_empty());
        assert!(queue.dead_letters().is_empty());
    }

    #[test]
    fn test_newer_file_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(
            &path,
            json!({ "version": 99, "pending": [], "deadLetters": [] }).to_string(),
        )
        .unwrap();

        let result = SyncQueue::open(&path, SyncQueueConfig::default());
        assert!(matches!(result, Err(SyncError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_failed_write_leaves_enqueue_undone() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let queue = SyncQueue::open(blocker.join("queue.json"), SyncQueueConfig::default())
            .unwrap();
        let result = queue.enqueue(mutation("tenders"));

        assert!(matches!(result, Err(SyncError::Storage(_))));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_mutation_after_delivery() {
        let dir = tempdir().unwrap();
        let sync_dir = dir.path().join("sync");
        let queue =
            SyncQueue::open(sync_dir.join("queue.json"), SyncQueueConfig::default()).unwrap();
        queue.enqueue(mutation("tenders")).unwrap();

        // The queue directory turns into a file, so every later write fails.
        std::fs::remove_dir_all(&sync_dir).unwrap();
        std::fs::write(&sync_dir, "").unwrap();

        let transport = ScriptedTransport::new();
        let result = queue.sync_all(&transport).await;

        assert!(matches!(result, Err(SyncError::Storage(_))));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending()[0].attempts, 0);
        assert!(!queue.is_syncing());
    }

    #[test]
    fn test_failed_write_keeps_dead_letters() {
        let dir = tempdir().unwrap();
        let sync_dir = dir.path().join("sync");
        let path = sync_dir.join("queue.json");
        let config = SyncQueueConfig { max_attempts: 1 };

        let stored = QueueFileStore::new(&path);
        let mut dead = QueuedMutation::from_new(mutation("tenders"));
        dead.attempts = 1;
        stored
            .save(&QueueSnapshot {
                version: 1,
                pending: Vec::new(),
                dead_letters: vec![dead],
            })
            .unwrap();

        let queue = SyncQueue::open(&path, config).unwrap();
        std::fs::remove_dir_all(&sync_dir).unwrap();
        std::fs::write(&sync_dir, "").unwrap();

        assert!(queue.retry_dead_letters().is_err());
        assert!(queue.is_empty());
        assert_eq!(queue.dead_letters().len(), 1);
    }

    #[test]
    fn test_store_writes_camel_case_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");
        let queue = SyncQueue::open(&path, SyncQueueConfig::default()).unwrap();
        queue.enqueue(mutation("tenders")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["pending"][0]["entity"], "tenders");
        assert_eq!(raw["pending"][0]["operation"], "CREATE");
        assert!(raw["deadLetters"].as_array().unwrap().is_empty());
    }
}
