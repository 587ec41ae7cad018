//! Standalone host for driving provisioning without a plugin runtime.
//!
//! # Architecture
//!
//! - `downloader`: Async file download with progress reporting
//! - `extractor`: Archive extraction (zip, tar.gz, tar.xz, 7z)
//!
//! [`LocalHost`] wires both into the [`InstallUtils`] capabilities and
//! forwards stage, progress and log events to a reporter.

pub mod downloader;
pub mod extractor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Settings;
use crate::host::{InstallEvent, InstallUtils, LoadUtils, ProgressFn};

pub use downloader::{download_to_dir, DownloadProgress, DownloadedFile};
pub use extractor::{extract_archive, ArchiveFormat};

/// Receives install events.
pub type Reporter = Arc<dyn Fn(InstallEvent) + Send + Sync>;

fn tracing_reporter() -> Reporter {
    Arc::new(|event| match event {
        InstallEvent::Stage(label) => info!("[stage] {}", label),
        InstallEvent::Progress(ratio) => debug!("[progress] {:.1}%", ratio * 100.0),
        InstallEvent::Log(message) => info!("{}", message),
    })
}

/// Host backed by the local filesystem and network.
#[derive(Clone)]
pub struct LocalHost {
    data_dir: PathBuf,
    tmp_dir: PathBuf,
    reporter: Reporter,
}

impl LocalHost {
    pub fn new(data_dir: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tmp_dir: tmp_dir.into(),
            reporter: tracing_reporter(),
        }
    }

    /// Uses the directories from `settings`, falling back to the defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.data_dir(), settings.tmp_dir())
    }

    /// Sends events to `reporter` instead of the log.
    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(InstallEvent) + Send + Sync + 'static,
    {
        self.reporter = Arc::new(reporter);
        self
    }

    fn emit(&self, event: InstallEvent) {
        (self.reporter)(event);
    }
}

impl std::fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHost")
            .field("data_dir", &self.data_dir)
            .field("tmp_dir", &self.tmp_dir)
            .finish_non_exhaustive()
    }
}

impl LoadUtils for LocalHost {
    fn data_path(&self) -> &Path {
        &self.data_dir
    }
}

#[async_trait]
impl InstallUtils for LocalHost {
    fn tmp_path(&self) -> &Path {
        &self.tmp_dir
    }

    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: &ProgressFn<'_>,
    ) -> Result<String> {
        let downloaded = download_to_dir(url, dest_dir, |progress| {
            if let Some(ratio) = progress.ratio() {
                on_progress(ratio);
            }
        })
        .await?;
        Ok(downloaded.file_name)
    }

    async fn extract(&self, archive_path: &Path) -> Result<Vec<String>> {
        let file_name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format = ArchiveFormat::from_file_name(&file_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown archive format: {}", file_name))?;
        let dest_dir = archive_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let archive_path = archive_path.to_path_buf();

        tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest_dir, format))
            .await
            .context("Extraction task failed")?
    }

    async fn cleanup(&self, path: &Path) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&entry_path).await
            } else {
                tokio::fs::remove_file(&entry_path).await
            };
            result.with_context(|| format!("Failed to remove {}", entry_path.display()))?;
        }

        debug!("Cleared {}", path.display());
        Ok(())
    }

    fn progress(&self, ratio: f64) {
        self.emit(InstallEvent::Progress(ratio));
    }

    fn stage(&self, label: &str) {
        self.emit(InstallEvent::Stage(label.to_string()));
    }

    fn log(&self, message: &str) {
        self.emit(InstallEvent::Log(message.to_string()));
    }
}
