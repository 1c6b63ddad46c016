//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Secrets are never stored here; see [`crate::credentials`].

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::credentials::{CredentialStore, CUSTOM_AUTH_HEADER, PROVIDER_API_KEY};
use crate::state::Staleness;
use crate::upload::UploadConfig;

// ---------------------------------------------------------------------------
// TranscriptionMode
// ---------------------------------------------------------------------------

/// Where recorded audio is sent.
///
/// | Variant | Endpoint                      | Credential                 |
/// |---------|-------------------------------|----------------------------|
/// | OpenAi  | fixed provider endpoint       | API key (Bearer), required |
/// | Custom  | `transcription.custom_url`    | raw header value, optional |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    #[default]
    OpenAi,
    Custom,
}

// ---------------------------------------------------------------------------
// ProviderModel
// ---------------------------------------------------------------------------

/// Transcription models offered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderModel {
    #[default]
    #[serde(rename = "gpt-4o-transcribe")]
    Gpt4oTranscribe,
    #[serde(rename = "gpt-4o-mini-transcribe")]
    Gpt4oMiniTranscribe,
    #[serde(rename = "whisper-1")]
    Whisper1,
}

impl ProviderModel {
    pub const ALL: [ProviderModel; 3] = [
        ProviderModel::Gpt4oTranscribe,
        ProviderModel::Gpt4oMiniTranscribe,
        ProviderModel::Whisper1,
    ];

    /// Identifier sent in the `model` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderModel::Gpt4oTranscribe => "gpt-4o-transcribe",
            ProviderModel::Gpt4oMiniTranscribe => "gpt-4o-mini-transcribe",
            ProviderModel::Whisper1 => "whisper-1",
        }
    }

    /// Label for settings screens.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderModel::Gpt4oTranscribe => "GPT-4o Transcribe",
            ProviderModel::Gpt4oMiniTranscribe => "GPT-4o Mini Transcribe",
            ProviderModel::Whisper1 => "Whisper",
        }
    }
}

impl std::str::FromStr for ProviderModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown model `{s}`"))
    }
}

// ---------------------------------------------------------------------------
// TranscriptionSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub mode: TranscriptionMode,
    /// Provider model (OpenAi mode only).
    pub model: ProviderModel,
    /// Endpoint URL (Custom mode only).
    pub custom_url: String,
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Timings for cross-process coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// A `recording` record older than this is considered abandoned.
    pub stale_after_secs: u64,
    /// Same for `stopping` / `uploading`; must exceed the upload timeout.
    pub busy_stale_after_secs: u64,
    /// Delay before `done` / `error` returns to `idle`.
    pub reset_after_secs: u64,
    /// How often the primary process re-checks the shared record even
    /// without a wake signal. `0` disables the activation ticker.
    pub activation_poll_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 30,
            busy_stale_after_secs: 90,
            reset_after_secs: 3,
            activation_poll_secs: 2,
        }
    }
}

impl SyncConfig {
    pub fn staleness(&self) -> Staleness {
        Staleness {
            recording: Duration::from_secs(self.stale_after_secs),
            busy: Duration::from_secs(self.busy_stale_after_secs),
        }
    }

    pub fn reset_after(&self) -> Duration {
        Duration::from_secs(self.reset_after_secs)
    }

    pub fn activation_poll(&self) -> Option<Duration> {
        (self.activation_poll_secs > 0).then(|| Duration::from_secs(self.activation_poll_secs))
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name, `None` means the system default.
    pub device: Option<String>,
    /// Capture is cut off after this many seconds; samples past the limit
    /// are dropped.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            max_recording_secs: 120.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use dictation_relay::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transcription: TranscriptionSettings,
    pub sync: SyncConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether an upload could be attempted at all: OpenAi mode needs a
    /// stored API key, Custom mode needs a URL.
    pub fn is_configured(&self, credentials: &dyn CredentialStore) -> bool {
        match self.transcription.mode {
            TranscriptionMode::OpenAi => credentials
                .get(PROVIDER_API_KEY)
                .is_some_and(|key| !key.is_empty()),
            TranscriptionMode::Custom => !self.transcription.custom_url.trim().is_empty(),
        }
    }

    /// Assemble the per-attempt upload configuration. Missing credentials
    /// become empty strings and are rejected later by the request builder.
    pub fn upload_config(&self, credentials: &dyn CredentialStore) -> UploadConfig {
        UploadConfig {
            mode: self.transcription.mode,
            api_key: credentials.get(PROVIDER_API_KEY).unwrap_or_default(),
            model: self.transcription.model.as_str().to_string(),
            custom_url: self.transcription.custom_url.clone(),
            custom_auth_header: credentials.get(CUSTOM_AUTH_HEADER).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.transcription.mode, TranscriptionMode::OpenAi);
        assert_eq!(cfg.transcription.model.as_str(), "gpt-4o-transcribe");
        assert!(cfg.transcription.custom_url.is_empty());
        assert_eq!(cfg.sync.stale_after_secs, 30);
        assert_eq!(cfg.sync.busy_stale_after_secs, 90);
        assert_eq!(cfg.sync.reset_after(), Duration::from_secs(3));
        assert_eq!(cfg.sync.activation_poll(), Some(Duration::from_secs(2)));
        assert!(cfg.audio.device.is_none());
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.transcription.mode = TranscriptionMode::Custom;
        cfg.transcription.model = ProviderModel::Whisper1;
        cfg.transcription.custom_url = "https://asr.example.com/v1".into();
        cfg.sync.reset_after_secs = 5;
        cfg.sync.activation_poll_secs = 0;
        cfg.audio.device = Some("USB Mic".into());

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded, cfg);
        assert_eq!(loaded.sync.activation_poll(), None);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[transcription]\nmode = \"custom\"\ncustom_url = \"http://localhost:9000\"\n",
        )
        .unwrap();

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.transcription.mode, TranscriptionMode::Custom);
        assert_eq!(loaded.transcription.model, ProviderModel::Gpt4oTranscribe);
        assert_eq!(loaded.sync, SyncConfig::default());
    }

    #[test]
    fn model_identifiers_serialise_as_provider_strings() {
        let toml = toml::to_string(&TranscriptionSettings {
            model: ProviderModel::Gpt4oMiniTranscribe,
            ..Default::default()
        })
        .unwrap();
        assert!(toml.contains("model = \"gpt-4o-mini-transcribe\""));
        assert!(toml.contains("mode = \"open_ai\""));

        for model in ProviderModel::ALL {
            assert_eq!(model.as_str().parse::<ProviderModel>(), Ok(model));
        }
        assert!("gpt-5".parse::<ProviderModel>().is_err());
    }

    #[test]
    fn openai_is_configured_only_with_a_key() {
        let cfg = AppConfig::default();
        let credentials = MemoryCredentialStore::new();
        assert!(!cfg.is_configured(&credentials));

        credentials.set(PROVIDER_API_KEY, "sk-test").unwrap();
        assert!(cfg.is_configured(&credentials));
    }

    #[test]
    fn custom_is_configured_only_with_a_url() {
        let mut cfg = AppConfig::default();
        cfg.transcription.mode = TranscriptionMode::Custom;
        let credentials = MemoryCredentialStore::new();
        assert!(!cfg.is_configured(&credentials));

        cfg.transcription.custom_url = "https://asr.example.com".into();
        assert!(cfg.is_configured(&credentials));
    }

    #[test]
    fn upload_config_combines_settings_and_credentials() {
        let mut cfg = AppConfig::default();
        cfg.transcription.model = ProviderModel::Whisper1;
        cfg.transcription.custom_url = "https://asr.example.com".into();

        let credentials = MemoryCredentialStore::new();
        credentials.set(PROVIDER_API_KEY, "sk-live").unwrap();
        credentials.set(CUSTOM_AUTH_HEADER, "Token t").unwrap();

        let upload = cfg.upload_config(&credentials);
        assert_eq!(upload.mode, TranscriptionMode::OpenAi);
        assert_eq!(upload.api_key, "sk-live");
        assert_eq!(upload.model, "whisper-1");
        assert_eq!(upload.custom_url, "https://asr.example.com");
        assert_eq!(upload.custom_auth_header, "Token t");
    }

    #[test]
    fn upload_config_without_credentials_is_empty() {
        let upload = AppConfig::default().upload_config(&MemoryCredentialStore::new());
        assert!(upload.api_key.is_empty());
        assert!(upload.custom_auth_header.is_empty());
    }
}
