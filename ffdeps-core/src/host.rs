//! Capabilities provided by the host that drives provisioning.
//!
//! The provisioning core never talks to the network or unpacks archives
//! itself. It asks the host through these traits, so a plugin host, the
//! bundled [`LocalHost`](crate::local::LocalHost) or a test double can be
//! plugged in.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Capabilities needed to resolve an already installed binary.
pub trait LoadUtils: Send + Sync {
    /// Directory that holds installed binaries.
    fn data_path(&self) -> &Path;
}

/// Progress callback handed to [`InstallUtils::download`], called with a
/// ratio in `0.0..=1.0`.
pub type ProgressFn<'a> = dyn Fn(f64) + Send + Sync + 'a;

/// Capabilities needed to install a binary.
#[async_trait]
pub trait InstallUtils: LoadUtils {
    /// Directory for downloads and extraction.
    fn tmp_path(&self) -> &Path;

    /// Downloads `url` into `dest_dir` and returns the local file name.
    async fn download(&self, url: &str, dest_dir: &Path, on_progress: &ProgressFn<'_>)
        -> Result<String>;

    /// Unpacks an archive next to itself and returns its top-level entry names.
    async fn extract(&self, archive_path: &Path) -> Result<Vec<String>>;

    /// Removes the contents of a directory.
    async fn cleanup(&self, path: &Path) -> Result<()>;

    fn progress(&self, ratio: f64);

    fn stage(&self, label: &str);

    fn log(&self, message: &str);
}

/// Observable event emitted while installing.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    Stage(String),
    Progress(f64),
    Log(String),
}
