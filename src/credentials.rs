//! Secret storage for upload credentials.
//!
//! Credentials are kept apart from both `settings.toml` and the shared state
//! record. [`FileCredentialStore`] writes a JSON map readable only by the
//! owning user; [`MemoryCredentialStore`] is the in-process variant.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Provider API key (OpenAi mode).
pub const PROVIDER_API_KEY: &str = "provider_api_key";
/// Raw `Authorization` header value (Custom mode).
pub const CUSTOM_AUTH_HEADER: &str = "custom_auth_header";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// `get` / `set` / `delete` over string secrets.
pub trait CredentialStore: Send + Sync {
    /// `None` when the key was never set or has been deleted.
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or overwrite.
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), CredentialError>;
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileCredentialStore
// ---------------------------------------------------------------------------

/// JSON object on disk, rewritten atomically on every change. On Unix the
/// file mode is `0600`.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_all()?;
        apply(&mut entries);
        self.write_all(&entries)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_all() {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                log::warn!("credentials: cannot read {}: {e}", self.path.display());
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })?;
        log::debug!("credentials: stored `{key}`");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        self.update(|entries| {
            entries.remove(key);
        })?;
        log::debug!("credentials: deleted `{key}`");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(store: &dyn CredentialStore) {
        assert_eq!(store.get(PROVIDER_API_KEY), None);

        store.set(PROVIDER_API_KEY, "sk-one").unwrap();
        assert_eq!(store.get(PROVIDER_API_KEY).as_deref(), Some("sk-one"));

        store.set(PROVIDER_API_KEY, "sk-two").unwrap();
        assert_eq!(store.get(PROVIDER_API_KEY).as_deref(), Some("sk-two"));

        store.set(CUSTOM_AUTH_HEADER, "Token abc").unwrap();
        store.delete(PROVIDER_API_KEY).unwrap();
        assert_eq!(store.get(PROVIDER_API_KEY), None);
        assert_eq!(store.get(CUSTOM_AUTH_HEADER).as_deref(), Some("Token abc"));

        store.delete("never-set").unwrap();
    }

    #[test]
    fn memory_store_set_overwrite_delete() {
        exercise(&MemoryCredentialStore::new());
    }

    #[test]
    fn file_store_set_overwrite_delete() {
        let dir = tempdir().unwrap();
        exercise(&FileCredentialStore::new(dir.path().join("credentials.json")));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        FileCredentialStore::new(&path)
            .set(PROVIDER_API_KEY, "sk-persisted")
            .unwrap();

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.get(PROVIDER_API_KEY).as_deref(), Some("sk-persisted"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_reads_as_absent_but_refuses_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert_eq!(store.get(PROVIDER_API_KEY), None);
        assert!(matches!(
            store.set(PROVIDER_API_KEY, "x"),
            Err(CredentialError::Corrupt(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private_to_the_user() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileCredentialStore::new(&path).set(PROVIDER_API_KEY, "sk").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let a = MemoryCredentialStore::new();
        let b = a.clone();
        a.set(PROVIDER_API_KEY, "shared").unwrap();
        assert_eq!(b.get(PROVIDER_API_KEY).as_deref(), Some("shared"));
    }
}
