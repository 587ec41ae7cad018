//! Default locations for installed binaries, downloads and settings.
//!
//! - Binaries: `{data_local_dir}/ffdeps/bin/`
//! - Downloads and extraction: `{data_local_dir}/ffdeps/tmp/`
//! - Settings: `{config_dir}/ffdeps/settings.json`
//!
//! Downloads sit next to the binaries so the final move stays on one
//! filesystem. When the platform has no data or config directory,
//! `{temp}/ffdeps/` is used instead.

use std::path::PathBuf;

/// Subdirectory name used under every base directory.
const APP_DIR: &str = "ffdeps";

const SETTINGS_FILE: &str = "settings.json";

// ============================================================================
// Path Resolution
// ============================================================================

/// Fallback base when the platform has no data or config directory.
fn temp_base() -> PathBuf {
    std::env::temp_dir().join(APP_DIR)
}

/// Base directory shared by binaries and downloads.
fn data_base() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(temp_base)
}

/// Returns the scratch directory for downloads.
///
/// Path: `{data_local_dir}/ffdeps/tmp/`
pub fn default_tmp_dir() -> PathBuf {
    data_base().join("tmp")
}

/// Returns the directory installed binaries are moved into.
///
/// Path: `{data_local_dir}/ffdeps/bin/`
pub fn default_data_dir() -> PathBuf {
    data_base().join("bin")
}

/// Returns the path to the settings file.
///
/// Path: `{config_dir}/ffdeps/settings.json`
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(temp_base)
        .join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_dir_sits_next_to_data_dir() {
        let tmp = default_tmp_dir();
        assert!(tmp.ends_with("ffdeps/tmp"), "got {}", tmp.display());
        assert_eq!(tmp.parent(), default_data_dir().parent());
    }

    #[test]
    fn test_data_dir_ends_in_bin() {
        let data = default_data_dir();
        assert!(data.ends_with("ffdeps/bin"), "got {}", data.display());
    }

    #[test]
    fn test_settings_path() {
        let path = settings_path();
        assert!(path.ends_with("ffdeps/settings.json"), "got {}", path.display());
    }
}
