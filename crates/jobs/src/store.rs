// crates/jobs/src/store.rs
//! Durable single-slot storage for the current job record.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::paths;
use crate::types::JobRecord;

/// Single-slot storage for the current [`JobRecord`].
///
/// `load` never fails: an absent or unreadable slot is the idle record.
/// Writes are synchronous so the last transition is on disk before the
/// caller moves on.
pub trait JobStore: Send + Sync {
    fn load(&self) -> JobRecord;
    fn save(&self, record: &JobRecord) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

fn parse_slot(raw: &str, origin: &str) -> JobRecord {
    match serde_json::from_str(raw) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(slot = origin, error = %e, "Corrupt job slot, falling back to idle");
            JobRecord::Idle
        }
    }
}

/// Job slot backed by one JSON file.
pub struct FileJobStore {
    path: PathBuf,
}

impl FileJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store using the versioned slot file inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(paths::job_slot_path(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JobStore for FileJobStore {
    fn load(&self) -> JobRecord {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => parse_slot(&raw, &self.path.to_string_lossy()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => JobRecord::Idle,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable job slot, falling back to idle");
                JobRecord::Idle
            }
        }
    }

    fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let content = serde_json::to_string(record)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        // Write atomically (temp file + rename)
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content).map_err(|e| StoreError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), status = %record.status(), "Saved job slot");
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

/// In-process job slot holding the serialized text.
#[derive(Default)]
pub struct MemoryJobStore {
    slot: Mutex<Option<String>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw text, which need not be valid.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// Current raw slot contents.
    pub fn raw(&self) -> Option<String> {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }

    fn set(&self, value: Option<String>) {
        match self.slot.lock() {
            Ok(mut slot) => *slot = value,
            Err(e) => {
                tracing::error!("Mutex poisoned writing memory job slot");
                *e.into_inner() = value;
            }
        }
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self) -> JobRecord {
        match self.raw() {
            Some(raw) => parse_slot(&raw, "memory"),
            None => JobRecord::Idle,
        }
    }

    fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.set(Some(serde_json::to_string(record)?));
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        self.set(None);
        Ok(())
    }
}
