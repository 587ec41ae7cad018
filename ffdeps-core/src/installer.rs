//! Install a dependency from a downloaded archive.
//!
//! The installer downloads one archive, requires it to unpack into a single
//! root entry, and moves the mapped files from the temporary area into the
//! data directory.

use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{DependencyError, Result};
use crate::host::InstallUtils;
use crate::template::{PathTemplate, TemplateContext};

/// Compression suffixes stripped to derive `{archiveName}`, longest first.
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.bz2", ".tar.gz", ".tar.xz", ".tar", ".tgz", ".txz", ".zip", ".bz2", ".7z", ".gz",
    ".xz",
];

// ============================================================================
// Install Plan
// ============================================================================

/// One file to move out of the extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    /// Location inside the extraction area.
    pub source: PathTemplate,
    /// File name inside the data directory.
    pub dest: String,
}

impl FileMapping {
    pub fn new(source: PathTemplate, dest: impl Into<String>) -> Self {
        Self {
            source,
            dest: dest.into(),
        }
    }
}

/// Work done after extraction and before files are moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCopy {
    /// Empty the data directory so stale binaries don't survive.
    ClearDestination,
}

/// Everything needed to install from one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub url: String,
    pub files: Vec<FileMapping>,
    pub before_copy: Option<PreCopy>,
}

// ============================================================================
// Installation
// ============================================================================

/// Strips a known compression suffix from a downloaded file name.
pub fn archive_name(filename: &str) -> &str {
    let lower = filename.to_ascii_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix) && lower.len() > suffix.len())
        .map(|suffix| &filename[..filename.len() - suffix.len()])
        .unwrap_or(filename)
}

/// Downloads, extracts and relocates the files described by `plan`.
pub async fn install_from_archive(plan: &InstallPlan, utils: &dyn InstallUtils) -> Result<()> {
    let tmp_path = utils.tmp_path();
    let data_path = utils.data_path();

    utils.stage("downloading");
    utils.log(&format!("url: {}", plan.url));
    let on_progress = |ratio: f64| utils.progress(ratio);
    let filename = utils.download(&plan.url, tmp_path, &on_progress).await?;
    let archive_path = tmp_path.join(&filename);
    let archive_name = archive_name(&filename);

    utils.stage("extracting");
    utils.log(&format!("archive: {}", archive_path.display()));
    let entries = utils.extract(&archive_path).await?;
    let root_file = match entries.as_slice() {
        [] => return Err(DependencyError::EmptyArchive),
        [root] => root.as_str(),
        _ => return Err(DependencyError::structure_mismatch(entries.join("\n"))),
    };
    debug!("Archive root entry: {}", root_file);

    if let Some(PreCopy::ClearDestination) = plan.before_copy {
        utils.stage("cleaning destination");
        utils.cleanup(data_path).await?;
    }

    let dest_names: Vec<&str> = plan.files.iter().map(|f| f.dest.as_str()).collect();
    utils.log(&format!("copying \"{}\"", dest_names.join("\", \"")));
    utils.log(&format!("-> from: {}", tmp_path.join(root_file).display()));
    utils.log(&format!("-> to: {}", data_path.display()));

    tokio::fs::create_dir_all(data_path)
        .await
        .map_err(|source| DependencyError::Io {
            from: tmp_path.join(root_file),
            to: data_path.to_path_buf(),
            source,
        })?;

    let ctx = TemplateContext {
        root_file,
        archive_name,
    };

    for mapping in &plan.files {
        let from = tmp_path.join(mapping.source.resolve(&ctx));
        let to = data_path.join(&mapping.dest);
        move_file(&from, &to).await?;
    }

    remove_leftovers(&archive_path, &tmp_path.join(root_file)).await;

    info!("Installed {} from {}", dest_names.join(", "), plan.url);
    Ok(())
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(missing_source(from, &e));
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("{} is on another filesystem, copying", from.display());
            copy_then_remove(from, to).await?;
        }
        Err(source) => {
            return Err(DependencyError::Io {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            });
        }
    }

    make_executable(to).map_err(|source| DependencyError::Io {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

/// Fallback for [`move_file`] when `rename` cannot cross filesystems.
async fn copy_then_remove(from: &Path, to: &Path) -> Result<()> {
    let io_error = |source| DependencyError::Io {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match tokio::fs::copy(from, to).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound && !from.exists() => {
            return Err(missing_source(from, &e));
        }
        Err(e) => return Err(io_error(e)),
    }
    tokio::fs::remove_file(from).await.map_err(io_error)
}

fn missing_source(from: &Path, e: &io::Error) -> DependencyError {
    DependencyError::structure_mismatch(format!("{}: {}", from.display(), e))
}

/// Deletes the downloaded archive and what is left of its extracted root.
async fn remove_leftovers(archive_path: &Path, root_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(archive_path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to clean up archive: {}", e);
        }
    }

    let removed = match tokio::fs::symlink_metadata(root_path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(root_path).await,
        Ok(_) => tokio::fs::remove_file(root_path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = removed {
        warn!("Failed to clean up {}: {}", root_path.display(), e);
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
