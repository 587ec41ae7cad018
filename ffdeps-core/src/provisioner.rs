//! Host-facing entry point for loading and installing dependencies.
//!
//! The `Provisioner` owns the target platform, the binary locator and the
//! install throttle. Hosts hand in their capabilities per call.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatcher::plan_for;
use crate::error::Result;
use crate::host::{InstallUtils, LoadUtils};
use crate::installer::install_from_archive;
use crate::locator::{BinaryLocator, CommandRunner, SystemRunner};
use crate::throttle::{Clock, InstallThrottle, ThrottleOutcome, DEFAULT_WINDOW};
use crate::types::{Dependency, Os};

/// Binary whose presence stands in for a whole shared archive.
const PRIMARY: Dependency = Dependency::Ffmpeg;

/// Loads and installs ffmpeg binaries for one platform.
#[derive(Debug)]
pub struct Provisioner {
    os: Os,
    locator: BinaryLocator,
    throttle: InstallThrottle,
}

impl Provisioner {
    pub fn new(os: Os) -> Self {
        Self {
            os,
            locator: BinaryLocator::new(os, Arc::new(SystemRunner)),
            throttle: InstallThrottle::new(DEFAULT_WINDOW),
        }
    }

    /// Creates a provisioner for the running platform.
    pub fn detect() -> Result<Self> {
        Ok(Self::new(Os::detect()?))
    }

    /// Replaces the runner used to validate candidates.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        let locator = BinaryLocator::new(self.os, runner);
        self.locator = match self.search_path() {
            Some(paths) => locator.with_search_path(paths),
            None => locator,
        };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.throttle = InstallThrottle::with_clock(self.throttle.window(), clock);
        self
    }

    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle = InstallThrottle::with_clock(window, self.throttle.clock());
        self
    }

    /// Searches `paths` instead of the process `PATH` for system binaries.
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.locator = self.locator.with_search_path(paths);
        self
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn throttle(&self) -> &InstallThrottle {
        &self.throttle
    }

    fn search_path(&self) -> Option<OsString> {
        self.locator.search_path().map(|p| p.to_os_string())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Returns the path of a working copy of `dependency`.
    pub async fn load(&self, dependency: Dependency, utils: &dyn LoadUtils) -> Result<PathBuf> {
        self.locator
            .locate(dependency.as_str(), utils.data_path())
            .await
    }

    /// Installs `dependency` into the host's data directory.
    ///
    /// Shared archives are throttled, so this may return without downloading
    /// anything when the archive was installed moments ago.
    pub async fn install(&self, dependency: Dependency, utils: &dyn InstallUtils) -> Result<()> {
        let strategy = plan_for(dependency, self.os);

        if !strategy.provides(dependency, self.os) {
            warn!(
                "The {} build does not include {}; installing the shared archive anyway",
                self.os.display_name(),
                dependency
            );
        }

        if !strategy.shared {
            return install_from_archive(&strategy.plan, utils).await;
        }

        let present = match self.load(PRIMARY, utils).await {
            Ok(path) => {
                debug!("{} present at {}", PRIMARY, path.display());
                true
            }
            Err(e) => {
                debug!("{} absent: {}", PRIMARY, e);
                false
            }
        };

        let outcome = self
            .throttle
            .run(present, || install_from_archive(&strategy.plan, utils))
            .await?;

        if outcome == ThrottleOutcome::Skipped {
            info!("{} was installed recently, skipping", dependency);
        }
        Ok(())
    }

    /// Loads `dependency`, installing it first if it can't be loaded.
    pub async fn ensure(&self, dependency: Dependency, utils: &dyn InstallUtils) -> Result<PathBuf> {
        match self.load(dependency, utils).await {
            Ok(path) => Ok(path),
            Err(e) => {
                info!("{} unavailable ({}), installing", dependency, e);
                self.install(dependency, utils).await?;
                self.load(dependency, utils).await
            }
        }
    }

    /// Load result for every known dependency.
    pub async fn status(&self, utils: &dyn LoadUtils) -> Vec<(Dependency, Result<PathBuf>)> {
        let mut results = Vec::with_capacity(Dependency::all().len());
        for dep in Dependency::all() {
            results.push((*dep, self.load(*dep, utils).await));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DependencyError;
    use crate::installer::tests::FakeHost;
    use crate::locator::tests::FakeRunner;
    use crate::throttle::ManualClock;
    use tempfile::TempDir;

    struct Fixture {
        provisioner: Provisioner,
        runner: Arc<FakeRunner>,
        clock: Arc<ManualClock>,
        _empty_path: TempDir,
    }

    fn fixture(os: Os) -> Fixture {
        let runner = Arc::new(FakeRunner::default());
        let clock = Arc::new(ManualClock::new());
        let empty_path = TempDir::new().unwrap();
        let provisioner = Provisioner::new(os)
            .with_search_path(empty_path.path().as_os_str())
            .with_runner(runner.clone())
            .with_clock(clock.clone());
        Fixture {
            provisioner,
            runner,
            clock,
            _empty_path: empty_path,
        }
    }

    fn answer_all(fx: &Fixture, host: &FakeHost, os: Os) {
        for dep in Dependency::all() {
            fx.runner.set(
                &host.data.path().join(dep.file_name(os)),
                &format!("{} version 7.1", dep),
            );
        }
    }

    fn windows_host() -> FakeHost {
        FakeHost::new(
            "ffmpeg-release-full.7z",
            &[
                "ffmpeg-7.1-full_build/bin/ffmpeg.exe",
                "ffmpeg-7.1-full_build/bin/ffprobe.exe",
                "ffmpeg-7.1-full_build/bin/ffplay.exe",
                "ffmpeg-7.1-full_build/doc/ffmpeg.html",
            ],
        )
    }

    fn linux_host() -> FakeHost {
        FakeHost::new(
            "ffmpeg-release-amd64-static.tar.xz",
            &[
                "ffmpeg-7.0.2-amd64-static/ffmpeg",
                "ffmpeg-7.0.2-amd64-static/ffprobe",
                "ffmpeg-7.0.2-amd64-static/readme.txt",
            ],
        )
    }

    #[test]
    fn test_builders_keep_settings() {
        let clock = Arc::new(ManualClock::new());
        let provisioner = Provisioner::new(Os::Linux)
            .with_clock(clock)
            .with_throttle_window(Duration::from_secs(30))
            .with_search_path("/opt/ffmpeg/bin")
            .with_runner(Arc::new(FakeRunner::default()));

        assert_eq!(provisioner.os(), Os::Linux);
        assert_eq!(provisioner.throttle().window(), Duration::from_secs(30));
        assert_eq!(
            provisioner.search_path(),
            Some(OsString::from("/opt/ffmpeg/bin"))
        );
    }

    #[tokio::test]
    async fn test_load_nothing_anywhere_is_not_found() {
        let fx = fixture(Os::Linux);
        let host = linux_host();

        let err = fx
            .provisioner
            .load(Dependency::Ffmpeg, &host)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_windows_install_places_three_binaries() {
        let fx = fixture(Os::Windows);
        let host = windows_host();
        let stale = host.data.path().join("ffmpeg-old.exe");
        std::fs::write(&stale, b"old").unwrap();

        fx.provisioner
            .install(Dependency::Ffprobe, &host)
            .await
            .unwrap();

        for name in ["ffmpeg.exe", "ffprobe.exe", "ffplay.exe"] {
            assert!(host.data.path().join(name).is_file(), "{name} missing");
        }
        assert!(!stale.exists());
        assert!(!host.data.path().join("ffmpeg.html").exists());
        assert_eq!(
            host.stages(),
            vec!["downloading", "extracting", "cleaning destination"]
        );

        answer_all(&fx, &host, Os::Windows);
        let path = fx
            .provisioner
            .load(Dependency::Ffplay, &host)
            .await
            .unwrap();
        assert_eq!(path, host.data.path().join("ffplay.exe"));
    }

    #[tokio::test]
    async fn test_linux_install_places_two_binaries() {
        let fx = fixture(Os::Linux);
        let host = linux_host();

        fx.provisioner
            .install(Dependency::Ffplay, &host)
            .await
            .unwrap();

        assert!(host.data.path().join("ffmpeg").is_file());
        assert!(host.data.path().join("ffprobe").is_file());
        assert!(!host.data.path().join("ffplay").exists());
        assert_eq!(host.downloads(), 1);
    }

    #[tokio::test]
    async fn test_shared_install_is_throttled() {
        let fx = fixture(Os::Linux);
        let host = linux_host();
        answer_all(&fx, &host, Os::Linux);

        fx.provisioner
            .install(Dependency::Ffmpeg, &host)
            .await
            .unwrap();
        fx.clock.advance(Duration::from_secs(60));
        fx.provisioner
            .install(Dependency::Ffprobe, &host)
            .await
            .unwrap();
        assert_eq!(host.downloads(), 1);

        fx.clock.advance(Duration::from_secs(300));
        fx.provisioner
            .install(Dependency::Ffprobe, &host)
            .await
            .unwrap();
        assert_eq!(host.downloads(), 2);
    }

    #[tokio::test]
    async fn test_throttle_ignored_when_primary_missing() {
        let fx = fixture(Os::Linux);
        let host = linux_host();

        fx.provisioner
            .install(Dependency::Ffmpeg, &host)
            .await
            .unwrap();
        std::fs::remove_file(host.data.path().join("ffmpeg")).unwrap();
        fx.provisioner
            .install(Dependency::Ffmpeg, &host)
            .await
            .unwrap();
        assert_eq!(host.downloads(), 2);
    }

    #[tokio::test]
    async fn test_macos_install_is_not_throttled() {
        let fx = fixture(Os::Macos);
        let host = FakeHost::new("ffprobe-7.1.7z", &["ffprobe"]);
        answer_all(&fx, &host, Os::Macos);

        fx.provisioner
            .install(Dependency::Ffprobe, &host)
            .await
            .unwrap();
        assert!(host.data.path().join("ffprobe").is_file());

        fx.provisioner
            .install(Dependency::Ffprobe, &host)
            .await
            .unwrap();
        assert_eq!(host.downloads(), 2);
        assert!(host.cleanups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_install_does_not_arm_throttle() {
        let fx = fixture(Os::Linux);
        let mut host = linux_host();
        host.fail_download = true;

        let err = fx
            .provisioner
            .install(Dependency::Ffmpeg, &host)
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Host(_)));
        assert_eq!(fx.provisioner.throttle().last_install().await, None);
    }

    #[tokio::test]
    async fn test_ensure_installs_then_loads() {
        let fx = fixture(Os::Linux);
        let host = linux_host();
        answer_all(&fx, &host, Os::Linux);

        let path = fx
            .provisioner
            .ensure(Dependency::Ffprobe, &host)
            .await
            .unwrap();
        assert_eq!(path, host.data.path().join("ffprobe"));
        assert_eq!(host.downloads(), 1);

        fx.provisioner
            .ensure(Dependency::Ffprobe, &host)
            .await
            .unwrap();
        assert_eq!(host.downloads(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_each_dependency() {
        let fx = fixture(Os::Linux);
        let host = linux_host();
        answer_all(&fx, &host, Os::Linux);
        fx.provisioner
            .install(Dependency::Ffmpeg, &host)
            .await
            .unwrap();

        let status = fx.provisioner.status(&host).await;
        let loaded: Vec<(Dependency, bool)> =
            status.iter().map(|(dep, res)| (*dep, res.is_ok())).collect();
        assert_eq!(
            loaded,
            vec![
                (Dependency::Ffmpeg, true),
                (Dependency::Ffprobe, true),
                (Dependency::Ffplay, false),
            ]
        );
    }
}
