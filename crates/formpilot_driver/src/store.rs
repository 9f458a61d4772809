use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use pilot_logging::pilot_warn;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Everything that must survive driver destruction (page reloads) and panel
/// closure. One flat record; writers replace it wholesale. Correctness under
/// sharing relies on at most one driver being active per job, so there is no
/// read-modify-write race to guard against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredState {
    /// Raw work lines not yet handed off, consumed front to back.
    pub pending_work_items: Vec<String>,
    /// Epoch milliseconds of the last pending-items write.
    pub pending_items_timestamp: Option<u64>,
    /// Resumption token: how many items the job started with. Processed
    /// count is derived as `job_total - pending_work_items.len()`.
    pub job_total: u32,
    /// Items that failed in the current run. Append-only until the next run
    /// starts.
    pub last_failed_items: Vec<String>,
}

impl StoredState {
    pub fn items_processed(&self) -> u32 {
        self.job_total
            .saturating_sub(self.pending_work_items.len() as u32)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialize error: {0}")]
    Serialize(String),
}

/// Shared key/value area visible to the controller, every driver instance,
/// and any panel.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<StoredState, StoreError>;
    fn save(&self, state: &StoredState) -> Result<(), StoreError>;
}

/// File-backed store: one JSON document, replaced atomically by writing a
/// temp file and renaming over the target.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<StoredState, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StoredState::default());
            }
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(err) => {
                // A torn or hand-edited file must not kill the automation;
                // start over from an empty state.
                pilot_warn!("Discarding unreadable store at {:?}: {}", self.path, err);
                Ok(StoredState::default())
            }
        }
    }

    fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(state)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

/// In-memory store for tests and the demo wiring.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoredState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(state: StoredState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<StoredState, StoreError> {
        Ok(self.inner.lock().expect("store lock").clone())
    }

    fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        *self.inner.lock().expect("store lock") = state.clone();
        Ok(())
    }
}
