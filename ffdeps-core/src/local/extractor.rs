//! Archive extraction for downloaded ffmpeg builds.
//!
//! Handles zip, tar.gz, tar.xz and 7z archives. Entries whose paths would
//! land outside the destination are skipped, as are tar links. Each
//! extractor reports the top-level names it wrote so the installer can find
//! the archive root.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path};
use tracing::{debug, info, warn};

// ============================================================================
// Archive Format
// ============================================================================

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
    SevenZ,
}

impl ArchiveFormat {
    /// Infers the format from a file name suffix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".7z") {
            Some(Self::SevenZ)
        } else {
            None
        }
    }
}

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts an archive to a destination directory.
///
/// Returns the top-level entry names in archive order, without duplicates.
pub fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
) -> Result<Vec<String>> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let mut roots = Vec::new();
    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir, &mut roots)?,
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir, &mut roots)?,
        ArchiveFormat::TarXz => extract_tar_xz(archive_path, dest_dir, &mut roots)?,
        ArchiveFormat::SevenZ => extract_7z(archive_path, dest_dir, &mut roots)?,
    }

    debug!("Top-level entries: {:?}", roots);
    Ok(roots)
}

/// Records the first normal component of `path`.
fn record_root(roots: &mut Vec<String>, path: &Path) {
    let first = path.components().find_map(|c| match c {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    });
    if let Some(name) = first {
        if !roots.contains(&name) {
            roots.push(name);
        }
    }
}

/// True for relative paths without `..` components.
fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_zip(archive_path: &Path, dest_dir: &Path, roots: &mut Vec<String>) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open zip: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!("Skipping unsafe path in zip: {}", entry.name());
                continue;
            }
        };

        let dest_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&dest_path)
                .with_context(|| format!("Failed to create: {}", dest_path.display()))?;

            io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            set_unix_permissions(&dest_path, entry.unix_mode())?;
        }

        record_root(roots, &entry_path);
    }

    debug!("ZIP extraction complete");
    Ok(())
}

// ============================================================================
// TAR Extraction
// ============================================================================

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path, roots: &mut Vec<String>) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open tar.gz: {}", archive_path.display()))?;

    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    extract_tar(decoder, dest_dir, roots)
}

fn extract_tar_xz(archive_path: &Path, dest_dir: &Path, roots: &mut Vec<String>) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open tar.xz: {}", archive_path.display()))?;

    let decoder = xz2::read::XzDecoder::new(BufReader::new(file));
    extract_tar(decoder, dest_dir, roots)
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path, roots: &mut Vec<String>) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let dest_dir_canonical = dest_dir
        .canonicalize()
        .unwrap_or_else(|_| dest_dir.to_path_buf());

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping symlink/hardlink in tar archive");
            continue;
        }

        let path = entry.path()?.into_owned();

        if !is_safe_relative(&path) {
            warn!("Skipping unsafe path in tar: {:?}", path);
            continue;
        }

        let dest_path = dest_dir.join(&path);

        let dest_canonical = if dest_path.exists() {
            dest_path.canonicalize()?
        } else if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
            let parent_canonical = parent.canonicalize()?;
            parent_canonical.join(dest_path.file_name().unwrap_or_default())
        } else {
            dest_path.clone()
        };

        if !dest_canonical.starts_with(&dest_dir_canonical) {
            warn!(
                "Skipping path that escapes dest_dir: {:?} -> {:?}",
                path, dest_canonical
            );
            continue;
        }

        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&dest_path)
                .with_context(|| format!("Failed to create: {}", dest_path.display()))?;
            io::copy(&mut entry, &mut outfile)?;
            outfile.flush()?;

            #[cfg(unix)]
            {
                if let Ok(mode) = entry.header().mode() {
                    set_unix_permissions(&dest_path, Some(mode))?;
                }
            }
        } else {
            debug!("Skipping {:?} entry {:?}", entry_type, path);
            continue;
        }

        record_root(roots, &path);
    }

    debug!("TAR extraction complete");
    Ok(())
}

// ============================================================================
// 7z Extraction
// ============================================================================

fn extract_7z(archive_path: &Path, dest_dir: &Path, roots: &mut Vec<String>) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open 7z: {}", archive_path.display()))?;

    sevenz_rust2::decompress_with_extract_fn(file, dest_dir, |entry, reader, dest| {
        let name = entry.name().replace('\\', "/");
        if !is_safe_relative(Path::new(&name)) {
            warn!("Skipping unsafe path in 7z: {}", name);
            return Ok(true);
        }
        record_root(roots, Path::new(&name));
        sevenz_rust2::default_entry_extract_fn(entry, reader, dest)
    })
    .with_context(|| format!("Failed to extract 7z: {}", archive_path.display()))?;

    debug!("7z extraction complete");
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

#[cfg(unix)]
fn set_unix_permissions(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        if mode & 0o111 != 0 {
            let permissions = fs::Permissions::from_mode(mode | 0o755);
            fs::set_permissions(path, permissions)
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }
    }

    Ok(())
}
