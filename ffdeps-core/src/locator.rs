//! Binary discovery and validation.
//!
//! A binary is looked up in the data directory first and on the system
//! `PATH` second. Every candidate is validated by running it with `-version`
//! and checking that it names itself.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use regex::RegexBuilder;
use tracing::debug;

use crate::error::{DependencyError, Result};
use crate::types::Os;

/// Flag passed to candidates during validation.
const VERSION_FLAG: &str = "-version";

// ============================================================================
// Command Execution
// ============================================================================

/// Captured result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
}

/// Runs programs and captures their output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[&str]) -> io::Result<CommandOutput>;
}

/// Runs real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

// ============================================================================
// Locator
// ============================================================================

/// Returns true if `output` starts with `<name> version`, ignoring case.
pub fn matches_version_output(name: &str, output: &str) -> bool {
    RegexBuilder::new(&format!("^{} version", regex::escape(name)))
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(output))
        .unwrap_or(false)
}

/// Finds and validates bundled or system-wide binaries.
#[derive(Clone)]
pub struct BinaryLocator {
    os: Os,
    runner: Arc<dyn CommandRunner>,
    /// Explicit search path; `None` means the process `PATH`.
    search_path: Option<OsString>,
}

impl BinaryLocator {
    pub fn new(os: Os, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            os,
            runner,
            search_path: None,
        }
    }

    /// Searches `paths` (formatted like `PATH`) instead of the process `PATH`.
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn search_path(&self) -> Option<&OsStr> {
        self.search_path.as_deref()
    }

    /// Where an installed copy of `name` is expected.
    pub fn bundled_path(&self, name: &str, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}{}", name, self.os.exe_suffix()))
    }

    /// Resolves a validated executable for `name`.
    ///
    /// When the bundled copy is unusable and nothing is found on the search
    /// path, the bundled error is returned so the caller sees why the
    /// installed copy was rejected.
    pub async fn locate(&self, name: &str, data_dir: &Path) -> Result<PathBuf> {
        let bundled = self.bundled_path(name, data_dir);

        let bundled_err = match tokio::fs::metadata(&bundled).await {
            Ok(meta) if meta.is_file() => match self.validate(name, &bundled).await {
                Ok(path) => return Ok(path),
                Err(e) => e,
            },
            Ok(_) => DependencyError::NotRegularFile {
                path: bundled.clone(),
            },
            Err(source) => DependencyError::NotFound {
                name: name.to_string(),
                path: bundled.clone(),
                source,
            },
        };
        debug!("Bundled {} unusable: {}", name, bundled_err);

        match self.search_system(name) {
            Ok(candidate) => {
                debug!("Trying system {} at {}", name, candidate.display());
                self.validate(name, &candidate).await
            }
            Err(e) => {
                debug!("No system {} on search path: {}", name, e);
                Err(bundled_err)
            }
        }
    }

    /// Runs `path -version` and checks the output names `name`.
    pub async fn validate(&self, name: &str, path: &Path) -> Result<PathBuf> {
        let output = self
            .runner
            .run(path, &[VERSION_FLAG])
            .await
            .map_err(|source| DependencyError::Execute {
                path: path.to_path_buf(),
                source,
            })?;

        if output.success && matches_version_output(name, &output.stdout) {
            Ok(path.to_path_buf())
        } else {
            Err(DependencyError::ValidationFailure {
                name: name.to_string(),
                path: path.to_path_buf(),
                output: output.stdout,
            })
        }
    }

    fn search_system(&self, name: &str) -> std::result::Result<PathBuf, which::Error> {
        match &self.search_path {
            Some(paths) => which::which_in(name, Some(paths), "."),
            None => which::which(name),
        }
    }
}

impl std::fmt::Debug for BinaryLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryLocator")
            .field("os", &self.os)
            .field("search_path", &self.search_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers `-version` with canned stdout per program path.
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        outputs: Mutex<HashMap<PathBuf, String>>,
        pub(crate) default_output: Option<String>,
        pub(crate) calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeRunner {
        pub(crate) fn answering(default_output: &str) -> Self {
            Self {
                default_output: Some(default_output.to_string()),
                ..Default::default()
            }
        }

        pub(crate) fn set(&self, path: &Path, output: &str) {
            self.outputs
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), output.to_string());
        }

        pub(crate) fn calls(&self) -> Vec<PathBuf> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, program: &Path, args: &[&str]) -> io::Result<CommandOutput> {
            assert_eq!(args, &[VERSION_FLAG]);
            self.calls.lock().unwrap().push(program.to_path_buf());
            let stdout = self
                .outputs
                .lock()
                .unwrap()
                .get(program)
                .cloned()
                .or_else(|| self.default_output.clone())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such program"))?;
            Ok(CommandOutput {
                success: true,
                stdout,
            })
        }
    }

    fn locator(runner: Arc<FakeRunner>, search_dir: &Path) -> BinaryLocator {
        BinaryLocator::new(Os::Linux, runner).with_search_path(search_dir.as_os_str())
    }

    #[cfg(unix)]
    fn write_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_version_output_matching() {
        assert!(matches_version_output("ffmpeg", "ffmpeg version 7.1 Copyright (c)"));
        assert!(matches_version_output("ffmpeg", "FFmpeg Version n6.0"));
        assert!(matches_version_output("ffprobe", "ffprobe version 7.1"));

        assert!(!matches_version_output("ffmpeg", "ffmpeg"));
        assert!(!matches_version_output("ffmpeg", "ffmpeg versio"));
        assert!(!matches_version_output("ffmpeg", " ffmpeg version 7.1"));
        assert!(!matches_version_output("ffmpeg", "ffprobe version 7.1"));
        assert!(!matches_version_output("ffmpeg", "usage: ffmpeg version"));
        assert!(!matches_version_output("ffmpeg", ""));
    }

    #[test]
    fn test_bundled_path_suffix() {
        let runner = Arc::new(FakeRunner::default());
        let data = Path::new("/data");
        assert_eq!(
            BinaryLocator::new(Os::Windows, runner.clone()).bundled_path("ffmpeg", data),
            data.join("ffmpeg.exe")
        );
        assert_eq!(
            BinaryLocator::new(Os::Macos, runner).bundled_path("ffmpeg", data),
            data.join("ffmpeg")
        );
    }

    #[tokio::test]
    async fn test_locate_bundled_binary() {
        let data = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        let bundled = data.path().join("ffmpeg");
        std::fs::write(&bundled, b"bin").unwrap();

        let runner = Arc::new(FakeRunner::default());
        runner.set(&bundled, "ffmpeg version 7.1");

        let path = locator(runner.clone(), empty.path())
            .locate("ffmpeg", data.path())
            .await
            .unwrap();
        assert_eq!(path, bundled);
        assert_eq!(runner.calls(), vec![bundled]);
    }

    #[tokio::test]
    async fn test_locate_rejects_bad_bundled_output() {
        let data = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        let bundled = data.path().join("ffprobe");
        std::fs::write(&bundled, b"bin").unwrap();

        let runner = Arc::new(FakeRunner::default());
        runner.set(&bundled, "ffmpeg version 7.1");

        let err = locator(runner, empty.path())
            .locate("ffprobe", data.path())
            .await
            .unwrap_err();
        match err {
            DependencyError::ValidationFailure { name, path, output } => {
                assert_eq!(name, "ffprobe");
                assert_eq!(path, bundled);
                assert_eq!(output, "ffmpeg version 7.1");
            }
            other => panic!("expected ValidationFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_locate_not_found_keeps_stat_error() {
        let data = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::answering("ffmpeg version 7.1"));

        let err = locator(runner.clone(), empty.path())
            .locate("ffmpeg", data.path())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        match err {
            DependencyError::NotFound { name, path, source } => {
                assert_eq!(name, "ffmpeg");
                assert_eq!(path, data.path().join("ffmpeg"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_locate_directory_is_not_a_regular_file() {
        let data = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        std::fs::create_dir(data.path().join("ffplay")).unwrap();
        let runner = Arc::new(FakeRunner::answering("ffplay version 7.1"));

        let err = locator(runner, empty.path())
            .locate("ffplay", data.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::NotRegularFile { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_locate_falls_back_to_search_path() {
        let data = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let system = bin.path().join("ffmpeg");
        write_executable(&system);

        let runner = Arc::new(FakeRunner::default());
        runner.set(&system, "ffmpeg version 6.1-static");

        let path = locator(runner, bin.path())
            .locate("ffmpeg", data.path())
            .await
            .unwrap();
        assert_eq!(path, system);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_candidate_validation_error_wins() {
        let data = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let system = bin.path().join("ffmpeg");
        write_executable(&system);

        let runner = Arc::new(FakeRunner::default());
        runner.set(&system, "not really ffmpeg");

        let err = locator(runner, bin.path())
            .locate("ffmpeg", data.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DependencyError::ValidationFailure { ref path, .. } if *path == system
        ));
    }

    #[tokio::test]
    async fn test_validate_spawn_failure() {
        let runner = Arc::new(FakeRunner::default());
        let err = BinaryLocator::new(Os::Linux, runner)
            .validate("ffmpeg", Path::new("/nowhere/ffmpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Execute { .. }));
    }
}
