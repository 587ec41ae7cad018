//! ffdeps Core Library
//!
//! Locates, validates and installs the ffmpeg, ffprobe and ffplay binaries
//! for a host application. It includes:
//!
//! - Binary lookup in a data directory with a fallback to the system `PATH`
//! - Per-platform install sources (Windows, Linux, macOS)
//! - An archive installer that moves binaries out of a single-root archive
//! - A throttle that avoids downloading the same shared archive twice
//! - A standalone local host (HTTPS downloads, zip/tar/7z extraction)
//! - Configuration management (settings, default paths)
//!
//! # Example
//!
//! ```ignore
//! use ffdeps_core::{Dependency, LocalHost, Provisioner, Settings};
//!
//! let settings = Settings::load()?;
//! let host = LocalHost::from_settings(&settings);
//! let provisioner = Provisioner::detect()?.with_throttle_window(settings.throttle_window());
//!
//! let ffprobe = provisioner.ensure(Dependency::Ffprobe, &host).await?;
//! println!("ffprobe at {}", ffprobe.display());
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod installer;
pub mod local;
pub mod locator;
pub mod provisioner;
pub mod template;
pub mod throttle;
pub mod types;

// Re-exports for convenience
pub use config::Settings;
pub use dispatcher::{plan_for, InstallStrategy};
pub use error::{DependencyError, Result};
pub use host::{InstallEvent, InstallUtils, LoadUtils, ProgressFn};
pub use installer::{install_from_archive, FileMapping, InstallPlan, PreCopy};
pub use local::LocalHost;
pub use locator::{BinaryLocator, CommandOutput, CommandRunner, SystemRunner};
pub use provisioner::Provisioner;
pub use template::{PathTemplate, TemplateContext, TemplateError, TemplateVar};
pub use throttle::{Clock, InstallThrottle, ManualClock, SystemClock, ThrottleOutcome};
pub use types::{Dependency, Os};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
