//! Error types for loading and installing dependencies.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::template::TemplateError;

/// Result alias used across the crate.
pub type Result<T, E = DependencyError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DependencyError {
    /// Neither the bundled binary nor a system binary was found.
    #[error("{name} not found at {}: {source}", path.display())]
    NotFound {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not a regular file: {}", path.display())]
    NotRegularFile { path: PathBuf },

    /// The candidate ran, but did not identify itself as the expected binary.
    #[error("Unexpected stdout when loading {name} from {}:\n{output}", path.display())]
    ValidationFailure {
        name: String,
        path: PathBuf,
        output: String,
    },

    #[error("Failed to execute {}: {source}", path.display())]
    Execute {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Extracted archive files list is empty.")]
    EmptyArchive,

    /// The archive no longer has the layout we expect.
    #[error("Unexpected archive structure: {detail}")]
    StructureMismatch { detail: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failure reported by a host capability (download, extract, cleanup).
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

impl DependencyError {
    /// Creates a structure mismatch error.
    pub fn structure_mismatch(detail: impl Into<String>) -> Self {
        Self::StructureMismatch {
            detail: detail.into(),
        }
    }

    /// Returns true for errors that mean "the binary isn't there", as opposed
    /// to a binary that exists but is broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
