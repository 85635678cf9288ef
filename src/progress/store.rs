// Snapshot storage. Key-value with synchronous accessors, mirroring the
// browser storage the snapshots originally lived in. The file store is the
// deployment implementation; the memory store backs tests and the demo.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use super::snapshot::ProgressSnapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored payload exists but cannot be decoded.
    #[error("corrupt progress snapshot: {0}")]
    Corrupt(String),

    #[error("snapshot storage unavailable: {0}")]
    Storage(String),
}

pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<ProgressSnapshot>, SnapshotError>;
    fn save(&self, key: &str, snapshot: &ProgressSnapshot) -> Result<(), SnapshotError>;
    fn remove(&self, key: &str) -> Result<(), SnapshotError>;
}

/// One JSON file per key under a base directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<ProgressSnapshot>, SnapshotError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnapshotError::Storage(e.to_string())),
        };
        let snapshot = serde_json::from_str(&raw)
            .map_err(|e| SnapshotError::Corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(Some(snapshot))
    }

    fn save(&self, key: &str, snapshot: &ProgressSnapshot) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|e| SnapshotError::Storage(e.to_string()))?;
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SnapshotError::Storage(e.to_string()))?;
        let path = self.path_for(key);
        fs::write(&path, json).map_err(|e| SnapshotError::Storage(e.to_string()))?;
        debug!("saved progress snapshot to {}", path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed progress snapshot {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::Storage(e.to_string())),
        }
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, ProgressSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<ProgressSnapshot>, SnapshotError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn save(&self, key: &str, snapshot: &ProgressSnapshot) -> Result<(), SnapshotError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Sanity check that a directory is usable for snapshots.
pub fn ensure_store_dir(dir: &Path) -> Result<(), SnapshotError> {
    fs::create_dir_all(dir).map_err(|e| SnapshotError::Storage(e.to_string()))
}
