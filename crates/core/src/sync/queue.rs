//! The offline mutation queue.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::errors::{Result, SyncError, TransportError};
use super::model::{NewMutation, QueueSnapshot, QueuedMutation, SyncSummary};
use super::store::{QueueFileStore, CURRENT_VERSION};
use super::traits::MutationTransport;

/// Attempts before a mutation is moved to the dead-letter list.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncQueueConfig {
    pub max_attempts: u32,
}

impl Default for SyncQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedMutation>,
    dead_letters: Vec<QueuedMutation>,
    last_summary: Option<SyncSummary>,
}

enum Outcome {
    Synced,
    Failed,
    DeadLettered,
}

/// Resets the running flag on every exit path of a sync pass.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// FIFO queue of mutations awaiting delivery.
///
/// The queue is shared behind an `Arc`; no lock is held across the transport's
/// awaits, so clients can keep enqueueing while a pass is running.
pub struct SyncQueue {
    state: Mutex<QueueState>,
    store: Option<QueueFileStore>,
    config: SyncQueueConfig,
    is_syncing: AtomicBool,
}

impl SyncQueue {
    /// In-memory queue; contents are lost on restart.
    pub fn new(config: SyncQueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            store: None,
            config,
            is_syncing: AtomicBool::new(false),
        }
    }

    /// Queue persisted to `path`, restoring whatever a previous run left behind.
    pub fn open(path: impl Into<PathBuf>, config: SyncQueueConfig) -> Result<Self> {
        let store = QueueFileStore::new(path);
        let snapshot = store.load()?;
        log::info!(
            "Restored sync queue from {}: {} pending, {} dead-lettered",
            store.path().display(),
            snapshot.pending.len(),
            snapshot.dead_letters.len()
        );

        Ok(Self {
            state: Mutex::new(QueueState {
                pending: snapshot.pending.into(),
                dead_letters: snapshot.dead_letters,
                last_summary: None,
            }),
            store: Some(store),
            config,
            is_syncing: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> SyncQueueConfig {
        self.config
    }

    pub fn enqueue(&self, mutation: NewMutation) -> Result<QueuedMutation> {
        let queued = QueuedMutation::from_new(mutation);
        let mut state = self.lock();
        let entry = queued.clone();
        self.commit(&mut state, move |pending, _| pending.push_back(entry))?;
        log::debug!(
            "Queued {:?} on {} ({} pending)",
            queued.operation,
            queued.entity,
            state.pending.len()
        );
        Ok(queued)
    }

    pub fn pending(&self) -> Vec<QueuedMutation> {
        self.lock().pending.iter().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<QueuedMutation> {
        self.lock().dead_letters.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::SeqCst)
    }

    /// Summary of the most recent completed pass.
    pub fn last_summary(&self) -> Option<SyncSummary> {
        self.lock().last_summary.clone()
    }

    /// Moves dead letters back to the end of the queue with a fresh attempt budget.
    pub fn retry_dead_letters(&self) -> Result<usize> {
        let mut state = self.lock();
        self.commit(&mut state, |pending, dead_letters| {
            let count = dead_letters.len();
            pending.extend(dead_letters.drain(..).map(|mut m| {
                m.attempts = 0;
                m.last_error = None;
                m
            }));
            count
        })
    }

    /// Flushes queued mutations in FIFO order.
    ///
    /// Only one pass runs at a time. When the transport reports itself
    /// unavailable nothing is sent. A mutation rejected upstream stays queued
    /// with its attempt count raised until `max_attempts` is reached, then it
    /// is dead-lettered. An `Offline` error from the transport ends the pass
    /// without charging an attempt.
    pub async fn sync_all(&self, transport: &dyn MutationTransport) -> Result<SyncSummary> {
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.is_syncing);

        let mut summary = SyncSummary::default();

        if !transport.is_available().await {
            log::info!("Sync skipped: upstream unavailable");
            summary.offline = true;
            return Ok(self.finish(summary));
        }

        // Mutations enqueued during the pass wait for the next one.
        let batch = self.pending();
        for mutation in batch {
            match transport.push(&mutation).await {
                Ok(()) => {
                    self.record(mutation.id, Ok(()))?;
                    summary.synced += 1;
                }
                Err(TransportError::Offline(reason)) => {
                    log::warn!("Sync interrupted, upstream went offline: {}", reason);
                    summary.offline = true;
                    break;
                }
                Err(err) => {
                    log::warn!("Failed to sync mutation {}: {}", mutation.id, err);
                    match self.record(mutation.id, Err(err))? {
                        Some(Outcome::DeadLettered) => summary.dead_lettered += 1,
                        Some(_) => summary.failed += 1,
                        None => {}
                    }
                }
            }
        }

        let summary = self.finish(summary);
        log::info!(
            "Sync pass finished: {} synced, {} failed, {} dead-lettered, {} remaining",
            summary.synced,
            summary.failed,
            summary.dead_lettered,
            summary.remaining
        );
        Ok(summary)
    }

    fn finish(&self, mut summary: SyncSummary) -> SyncSummary {
        let mut state = self.lock();
        summary.remaining = state.pending.len();
        state.last_summary = Some(summary.clone());
        summary
    }

    fn record(
        &self,
        id: Uuid,
        result: std::result::Result<(), TransportError>,
    ) -> Result<Option<Outcome>> {
        let mut state = self.lock();
        let Some(index) = state.pending.iter().position(|m| m.id == id) else {
            return Ok(None);
        };
        let max_attempts = self.config.max_attempts;

        let outcome = self.commit(&mut state, move |pending, dead_letters| match result {
            Ok(()) => {
                pending.remove(index);
                Outcome::Synced
            }
            Err(err) => {
                let entry = &mut pending[index];
                entry.attempts += 1;
                entry.last_error = Some(err.to_string());
                if entry.attempts >= max_attempts {
                    if let Some(dead) = pending.remove(index) {
                        dead_letters.push(dead);
                    }
                    Outcome::DeadLettered
                } else {
                    Outcome::Failed
                }
            }
        })?;
        Ok(Some(outcome))
    }

    /// Applies `change` to a copy of the queue, writes it, and only then
    /// swaps it in. A failed write leaves the queue as it was.
    fn commit<R>(
        &self,
        state: &mut QueueState,
        change: impl FnOnce(&mut VecDeque<QueuedMutation>, &mut Vec<QueuedMutation>) -> R,
    ) -> Result<R> {
        let Some(store) = &self.store else {
            return Ok(change(&mut state.pending, &mut state.dead_letters));
        };

        let mut pending = state.pending.clone();
        let mut dead_letters = state.dead_letters.clone();
        let output = change(&mut pending, &mut dead_letters);
        store.save(&QueueSnapshot {
            version: CURRENT_VERSION,
            pending: pending.iter().cloned().collect(),
            dead_letters: dead_letters.clone(),
        })?;

        state.pending = pending;
        state.dead_letters = dead_letters;
        Ok(output)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
