//! Configuration module for dictation-relay.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and [`SettingsSource`], which feeds
//! fresh upload settings to the coordinator on every attempt.

pub mod paths;
pub mod settings;

use std::path::PathBuf;
use std::sync::Arc;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, ProviderModel, SyncConfig, TranscriptionMode, TranscriptionSettings,
};

use crate::credentials::CredentialStore;
use crate::upload::{UploadConfig, UploadConfigSource};

/// Re-reads `settings.toml` and the credential store for every upload, so
/// edits made while the app runs apply to the next attempt.
pub struct SettingsSource {
    settings_file: PathBuf,
    credentials: Arc<dyn CredentialStore>,
}

impl SettingsSource {
    pub fn new(settings_file: impl Into<PathBuf>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            settings_file: settings_file.into(),
            credentials,
        }
    }
}

impl UploadConfigSource for SettingsSource {
    fn upload_config(&self) -> UploadConfig {
        let config = AppConfig::load_from(&self.settings_file).unwrap_or_else(|e| {
            log::warn!(
                "config: cannot read {}: {e:#}; using defaults",
                self.settings_file.display()
            );
            AppConfig::default()
        });
        config.upload_config(self.credentials.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{MemoryCredentialStore, PROVIDER_API_KEY};
    use tempfile::tempdir;

    #[test]
    fn settings_source_picks_up_edits_between_attempts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let credentials = Arc::new(MemoryCredentialStore::new());
        credentials.set(PROVIDER_API_KEY, "sk-1").unwrap();

        let source = SettingsSource::new(&path, credentials.clone());
        let first = source.upload_config();
        assert_eq!(first.mode, TranscriptionMode::OpenAi);
        assert_eq!(first.api_key, "sk-1");

        let mut cfg = AppConfig::default();
        cfg.transcription.mode = TranscriptionMode::Custom;
        cfg.transcription.custom_url = "http://localhost:9000/asr".into();
        cfg.save_to(&path).unwrap();
        credentials.set(PROVIDER_API_KEY, "sk-2").unwrap();

        let second = source.upload_config();
        assert_eq!(second.mode, TranscriptionMode::Custom);
        assert_eq!(second.custom_url, "http://localhost:9000/asr");
        assert_eq!(second.api_key, "sk-2");
    }

    #[test]
    fn unreadable_settings_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let source = SettingsSource::new(&path, Arc::new(MemoryCredentialStore::new()));
        assert_eq!(source.upload_config().model, "gpt-4o-transcribe");
    }
}
