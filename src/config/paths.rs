//! Where settings, credentials and the shared record live.
//!
//! Config dir (settings + credentials):
//!   Windows: %APPDATA%\dictation-relay\
//!   macOS:   ~/Library/Application Support/dictation-relay/
//!   Linux:   ~/.config/dictation-relay/
//!
//! Shared dir (state record + wake sockets, visible to every cooperating
//! process of the same user):
//!   Windows: %LOCALAPPDATA%\dictation-relay\shared\
//!   macOS:   ~/Library/Application Support/dictation-relay/shared/
//!   Linux:   ~/.local/share/dictation-relay/shared/

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `credentials.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `credentials.json`.
    pub credentials_file: PathBuf,
    /// Directory holding the shared state record.
    pub shared_dir: PathBuf,
    /// Root for wake-signal sockets, inside `shared_dir`.
    pub wake_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "dictation-relay";

    /// Platform directories from `dirs`, or `./dictation-relay` when the
    /// platform has none.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self::from_dirs(config_dir, data_dir.join("shared"))
    }

    /// Same config dir, but processes coordinate through `shared_dir`.
    pub fn with_shared_dir(self, shared_dir: impl AsRef<Path>) -> Self {
        Self::from_dirs(self.config_dir, shared_dir.as_ref().to_path_buf())
    }

    fn from_dirs(config_dir: PathBuf, shared_dir: PathBuf) -> Self {
        let settings_file = config_dir.join("settings.toml");
        let credentials_file = config_dir.join("credentials.json");
        let wake_dir = shared_dir.join("wake");

        Self {
            config_dir,
            settings_file,
            credentials_file,
            shared_dir,
            wake_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.shared_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .credentials_file
            .file_name()
            .is_some_and(|n| n == "credentials.json"));
        assert!(paths.wake_dir.starts_with(&paths.shared_dir));
    }

    #[test]
    fn shared_dir_override_keeps_config_dir() {
        let default = AppPaths::new();
        let paths = AppPaths::new().with_shared_dir("/tmp/relay-test");

        assert_eq!(paths.config_dir, default.config_dir);
        assert_eq!(paths.shared_dir, PathBuf::from("/tmp/relay-test"));
        assert_eq!(paths.wake_dir, PathBuf::from("/tmp/relay-test/wake"));
    }
}
