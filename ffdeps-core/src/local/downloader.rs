//! Streaming archive downloads with progress reporting and URL validation.
//!
//! Downloads are restricted to HTTPS hosts that publish ffmpeg builds. The
//! local file name is taken from the server's `Content-Disposition` header,
//! falling back to the last segment of the final URL after redirects.

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Used when neither the headers nor the URL provide a usable name.
const FALLBACK_FILE_NAME: &str = "download";

/// Most redirect hops followed for one download.
const MAX_REDIRECTS: usize = 10;

// ============================================================================
// URL Security Validation
// ============================================================================

/// Hosts that publish ffmpeg builds.
const ALLOWED_DOMAINS: &[&str] = &["gyan.dev", "johnvansickle.com", "evermeet.cx"];

/// Validates that a URL is safe for downloading.
///
/// Checks:
/// - URL scheme must be HTTPS
/// - Host must be in the allowed domain list
pub(crate) fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL: {}", url_str))?;

    if url.scheme() != "https" {
        anyhow::bail!("URL must use HTTPS: {}", url_str);
    }

    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL must have a host: {}", url_str))?;

    let is_allowed = ALLOWED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)));

    if !is_allowed {
        anyhow::bail!(
            "Download domain not allowed: {}. Allowed: {:?}",
            host,
            ALLOWED_DOMAINS
        );
    }

    Ok(url)
}

/// Checks one redirect hop against the same rules as the initial URL.
fn check_redirect(url: &Url, previous_hops: usize) -> Result<()> {
    if previous_hops >= MAX_REDIRECTS {
        anyhow::bail!("Too many redirects ({}) ending at {}", previous_hops, url);
    }
    validate_url(url.as_str()).map(|_| ())
}

fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        match check_redirect(attempt.url(), attempt.previous().len()) {
            Ok(()) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    })
}

// ============================================================================
// Download Progress
// ============================================================================

/// Progress information during a download.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    /// Total bytes expected (if known from Content-Length header).
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        Self {
            bytes_downloaded,
            total_bytes,
        }
    }

    /// Completed fraction in `0.0..=1.0`, or None if the total is unknown.
    pub fn ratio(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total > 0 {
                (self.bytes_downloaded as f64 / total as f64).min(1.0)
            } else {
                0.0
            }
        })
    }
}

// ============================================================================
// File Naming
// ============================================================================

/// Extracts the `filename` parameter from a `Content-Disposition` value.
fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').find_map(|part| {
        let (key, raw) = part.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        sanitize_file_name(raw.trim().trim_matches('"'))
    })
}

/// Last non-empty path segment of `url`.
fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .and_then(sanitize_file_name)
}

/// Keeps only the final component, rejecting names that would escape the
/// download directory.
fn sanitize_file_name(name: &str) -> Option<String> {
    let name = name.rsplit(|c| c == '/' || c == '\\').next()?.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

// ============================================================================
// Download Function
// ============================================================================

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub bytes: u64,
}

/// Downloads `url` into `dest_dir` with streaming and progress reporting.
///
/// # Errors
///
/// Returns an error if:
/// - The URL is not HTTPS or from an allowed domain.
/// - The network request fails.
/// - The server returns a non-success status code.
/// - The file cannot be created or written.
pub async fn download_to_dir<F>(url: &str, dest_dir: &Path, progress_cb: F) -> Result<DownloadedFile>
where
    F: Fn(DownloadProgress),
{
    let parsed = validate_url(url)?;

    tokio::fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let client = reqwest::Client::builder()
        .redirect(redirect_policy())
        .build()
        .context("Failed to build HTTP client")?;
    let response = client
        .get(parsed)
        .send()
        .await
        .with_context(|| format!("Failed to start download from {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!(
            "Download failed with status {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    let file_name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(response.url()))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
    let dest = dest_dir.join(&file_name);

    let total_bytes = response.content_length();
    debug!("Content-Length: {:?}", total_bytes);
    info!("Downloading {} to {}", response.url(), dest.display());

    let mut file = File::create(&dest)
        .await
        .with_context(|| format!("Failed to create file: {}", dest.display()))?;

    progress_cb(DownloadProgress::new(0, total_bytes));

    let bytes_downloaded = match write_body(response, &mut file, total_bytes, &progress_cb).await {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(file);
            discard_partial(&dest).await;
            return Err(e);
        }
    };

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(DownloadedFile {
        file_name,
        bytes: bytes_downloaded,
    })
}

/// Streams the response body into `file`, returning the byte count.
async fn write_body<F>(
    response: reqwest::Response,
    file: &mut File,
    total_bytes: Option<u64>,
    progress_cb: &F,
) -> Result<u64>
where
    F: Fn(DownloadProgress),
{
    let mut stream = response.bytes_stream();
    let mut bytes_downloaded: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.with_context(|| "Failed to read chunk from response stream")?;

        file.write_all(&chunk)
            .await
            .with_context(|| "Failed to write chunk to file")?;

        bytes_downloaded += chunk.len() as u64;
        progress_cb(DownloadProgress::new(bytes_downloaded, total_bytes));
    }

    file.flush().await.context("Failed to flush file")?;
    Ok(bytes_downloaded)
}

/// Removes a partially written download.
async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial download {}: {}", path.display(), e);
        }
    }
}
