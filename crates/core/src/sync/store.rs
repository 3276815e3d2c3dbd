//! JSON file persistence for the sync queue.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{Result, SyncError};
use super::model::QueueSnapshot;

pub(crate) const CURRENT_VERSION: u32 = 1;

/// Stores the queue as a single pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct QueueFileStore {
    path: PathBuf,
}

impl QueueFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored queue. A missing or empty file is an empty queue.
    pub fn load(&self) -> Result<QueueSnapshot> {
        if !self.path.exists() {
            return Ok(empty_snapshot());
        }

        let raw = fs::read(&self.path)?;
        if raw.is_empty() {
            return Ok(empty_snapshot());
        }

        let snapshot: QueueSnapshot = serde_json::from_slice(&raw)?;
        if snapshot.version > CURRENT_VERSION {
            return Err(SyncError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Writes the queue through a temp file so a crash never leaves half a document.
    pub fn save(&self, snapshot: &QueueSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn empty_snapshot() -> QueueSnapshot {
    QueueSnapshot {
        version: CURRENT_VERSION,
        ..Default::default()
    }
}
