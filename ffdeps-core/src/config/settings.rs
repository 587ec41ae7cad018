//! User settings for ffdeps.
//!
//! Settings are read from a JSON file. Every field is optional; a missing
//! file yields the defaults, but a malformed one is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::paths;

/// Seconds after a shared install during which repeat installs are skipped.
pub const DEFAULT_THROTTLE_WINDOW_SECS: u64 = 300;

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where installed binaries live. Defaults to [`paths::default_data_dir`].
    pub data_dir: Option<PathBuf>,

    /// Where archives are downloaded and unpacked. Defaults to
    /// [`paths::default_tmp_dir`].
    pub tmp_dir: Option<PathBuf>,

    pub throttle_window_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            tmp_dir: None,
            throttle_window_secs: DEFAULT_THROTTLE_WINDOW_SECS,
        }
    }
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_path())
    }

    /// Loads settings from `path`, returning defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings: {}", path.display()));
            }
        };

        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Writes settings to `path` as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(paths::default_data_dir)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(paths::default_tmp_dir)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_secs(self.throttle_window_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.throttle_window(), Duration::from_secs(300));
        assert_eq!(settings.data_dir(), paths::default_data_dir());
        assert_eq!(settings.tmp_dir(), paths::default_tmp_dir());
    }

    #[test]
    fn test_settings_load_returns_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{ "data_dir": "/opt/ffdeps/bin" }"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.data_dir(), PathBuf::from("/opt/ffdeps/bin"));
        assert_eq!(settings.throttle_window_secs, DEFAULT_THROTTLE_WINDOW_SECS);
    }

    #[test]
    fn test_settings_invalid_json_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn test_settings_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/settings.json");
        let settings = Settings {
            data_dir: Some(temp.path().join("bin")),
            tmp_dir: None,
            throttle_window_secs: 30,
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }
}
