use clap::{Parser, Subcommand};
use ffdeps_core::Dependency;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "ffdeps")]
#[command(author, version, about = "Locate and install ffmpeg, ffprobe and ffplay")]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for installed binaries (overrides settings).
    ///
    /// On Windows and Linux every install empties this directory first, so
    /// point it at a folder used only by ffdeps.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory for downloads and extraction (overrides settings)
    #[arg(long, global = true)]
    pub tmp_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the path of a working binary
    Load {
        /// ffmpeg, ffprobe or ffplay
        dependency: Dependency,
    },

    /// Download and install a binary
    Install {
        /// ffmpeg, ffprobe, ffplay or "all"
        target: InstallTarget,
    },

    /// Load a binary, installing it first if needed
    Ensure {
        /// ffmpeg, ffprobe or ffplay
        dependency: Dependency,
    },

    /// Show which binaries can be loaded
    Status,

    /// Print manual installation notes
    Instructions {
        /// ffmpeg, ffprobe or ffplay
        dependency: Dependency,
    },
}

/// What `install` should install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallTarget {
    All,
    One(Dependency),
}

impl InstallTarget {
    pub fn dependencies(&self) -> Vec<Dependency> {
        match self {
            Self::All => Dependency::all().to_vec(),
            Self::One(dep) => vec![*dep],
        }
    }
}

impl FromStr for InstallTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::One)
        }
    }
}
