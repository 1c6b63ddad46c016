//! Single-slot persistence for the shared [`OperationState`].
//!
//! Both processes read and write the same slot; the last write wins. Writes
//! replace the whole record atomically so a reader never sees half of one.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::record::OperationState;

/// Key the record is stored under.
pub const STATE_KEY: &str = "transcription_state";

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("state store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// StateStore trait
// ---------------------------------------------------------------------------

/// Durable single-slot storage visible to every cooperating process.
pub trait StateStore: Send + Sync {
    /// Current record. Never fails: an absent or undecodable slot yields a
    /// fresh `Idle` record.
    fn load(&self) -> OperationState;

    /// Overwrite the slot with `state`.
    fn save(&self, state: &OperationState) -> Result<(), StoreError>;
}

fn decode(bytes: &[u8]) -> OperationState {
    match serde_json::from_slice(bytes) {
        Ok(state) => state,
        Err(e) => {
            log::warn!("store: discarding unreadable state record ({e}); resetting to idle");
            OperationState::idle()
        }
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// JSON file `<dir>/<key>.json`, replaced via write-to-temp + rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_key(dir, STATE_KEY)
    }

    pub fn with_key(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        // Per-process temp name so two writers never share a half-written file.
        self.path
            .with_extension(format!("json.{}.tmp", std::process::id()))
    }
}

impl StateStore for FileStore {
    fn load(&self) -> OperationState {
        match std::fs::read(&self.path) {
            Ok(bytes) => decode(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => OperationState::idle(),
            Err(e) => {
                log::warn!("store: failed to read {}: {e}", self.path.display());
                OperationState::idle()
            }
        }
    }

    fn save(&self, state: &OperationState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(state)?;
        let temp_path = self.temp_path();

        let mut temp_file = std::fs::File::create(&temp_path)?;
        temp_file.write_all(&bytes)?;
        temp_file.sync_all()?;
        drop(temp_file);

        std::fs::rename(&temp_path, &self.path)?;
        log::debug!("store: saved {} to {}", state.status(), self.path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process key map. Clones share the same slots, so two coordinators
/// holding clones behave like two processes sharing one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes currently held for [`STATE_KEY`].
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(STATE_KEY)
            .cloned()
    }

    /// Replace the slot with arbitrary bytes (e.g. a record from an older
    /// schema).
    pub fn put_raw(&self, bytes: impl Into<Vec<u8>>) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(STATE_KEY.to_string(), bytes.into());
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> OperationState {
        match self.raw() {
            Some(bytes) => decode(&bytes),
            None => OperationState::idle(),
        }
    }

    fn save(&self, state: &OperationState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)?;
        self.put_raw(bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
