//! Per-platform install sources.
//!
//! Windows and Linux builds ship every binary in one shared archive, so their
//! installs are throttled. macOS builds are published per binary.

use crate::installer::{FileMapping, InstallPlan, PreCopy};
use crate::template::{PathTemplate, TemplateVar};
use crate::types::{Dependency, Os};

const WINDOWS_URL: &str = "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-full.7z";

const LINUX_URL: &str =
    "https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-amd64-static.tar.xz";

const MACOS_URL_BASE: &str = "https://evermeet.cx/ffmpeg/getrelease";

/// Binaries in the shared Windows archive, under `{rootFile}/bin/`.
const WINDOWS_BINARIES: &[Dependency] = &[Dependency::Ffmpeg, Dependency::Ffprobe, Dependency::Ffplay];

/// Binaries in the shared Linux archive. The static build has no ffplay.
const LINUX_BINARIES: &[Dependency] = &[Dependency::Ffmpeg, Dependency::Ffprobe];

/// How to install a dependency on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStrategy {
    pub plan: InstallPlan,
    /// The archive provides several dependencies at once.
    pub shared: bool,
}

impl InstallStrategy {
    /// Returns true if installing this plan places `dependency`.
    pub fn provides(&self, dependency: Dependency, os: Os) -> bool {
        let name = dependency.file_name(os);
        self.plan.files.iter().any(|f| f.dest == name)
    }
}

/// Selects the install strategy for `dependency` on `os`.
pub fn plan_for(dependency: Dependency, os: Os) -> InstallStrategy {
    match os {
        Os::Windows => shared_strategy(WINDOWS_URL, WINDOWS_BINARIES, "bin/", os),
        Os::Linux => shared_strategy(LINUX_URL, LINUX_BINARIES, "", os),
        Os::Macos => {
            let name = dependency.as_str();
            InstallStrategy {
                plan: InstallPlan {
                    url: format!("{}/{}/7z", MACOS_URL_BASE, name),
                    files: vec![FileMapping::new(PathTemplate::literal(name), name)],
                    before_copy: None,
                },
                shared: false,
            }
        }
    }
}

fn shared_strategy(url: &str, binaries: &[Dependency], subdir: &str, os: Os) -> InstallStrategy {
    let files = binaries
        .iter()
        .map(|dep| {
            let file_name = dep.file_name(os);
            let source =
                PathTemplate::under(TemplateVar::RootFile, &format!("{}{}", subdir, file_name));
            FileMapping::new(source, file_name)
        })
        .collect();

    InstallStrategy {
        plan: InstallPlan {
            url: url.to_string(),
            files,
            before_copy: Some(PreCopy::ClearDestination),
        },
        shared: true,
    }
}
