//! Core types for dependency provisioning.
//!
//! This module defines the dependency identifiers and the operating system
//! selection used by the locator and the platform dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DependencyError;

// ============================================================================
// Dependency Identifiers
// ============================================================================

/// One of the media binaries this crate provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
    /// Transcoder.
    Ffmpeg,
    /// Media prober.
    Ffprobe,
    /// Media player.
    Ffplay,
}

/// Manual installation notes for ffplay.
const FFPLAY_INSTRUCTIONS: &str = "\
ffplay is not part of the static Linux build, so it can't be installed automatically there.

Install it with your distribution's package manager instead, for example:

    sudo apt install ffmpeg      # Debian, Ubuntu
    sudo dnf install ffmpeg      # Fedora
    sudo pacman -S ffmpeg        # Arch

Once `ffplay` is on your PATH it will be picked up automatically.";

impl Dependency {
    /// Returns all dependencies in registration order.
    pub fn all() -> &'static [Dependency] {
        &[Self::Ffmpeg, Self::Ffprobe, Self::Ffplay]
    }

    /// Returns the binary name, without any platform suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::Ffplay => "ffplay",
        }
    }

    /// Returns the on-disk file name of this binary for the given OS.
    pub fn file_name(&self, os: Os) -> String {
        format!("{}{}", self.as_str(), os.exe_suffix())
    }

    /// Manual installation notes, for dependencies that need them.
    pub fn instructions(&self) -> Option<&'static str> {
        match self {
            Self::Ffplay => Some(FFPLAY_INSTRUCTIONS),
            _ => None,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Dependency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg),
            "ffprobe" => Ok(Self::Ffprobe),
            "ffplay" => Ok(Self::Ffplay),
            _ => Err(format!("Unknown dependency: {}", s)),
        }
    }
}

// ============================================================================
// Operating System
// ============================================================================

/// Operating systems with a known install source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Macos,
}

impl Os {
    /// Detects the operating system this process runs on.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::UnsupportedPlatform`] on any other OS.
    pub fn detect() -> Result<Self, DependencyError> {
        Self::from_identifier(std::env::consts::OS)
    }

    /// Parses an OS identifier.
    ///
    /// Accepts Rust's `std::env::consts::OS` values as well as the
    /// node-style `win32` / `darwin` spellings.
    pub fn from_identifier(id: &str) -> Result<Self, DependencyError> {
        match id.to_lowercase().as_str() {
            "windows" | "win32" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::Macos),
            other => Err(DependencyError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Suffix appended to executable file names.
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Macos => "",
        }
    }

    /// Returns a human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Linux => "Linux",
            Self::Macos => "macOS",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
