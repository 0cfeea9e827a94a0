//! Test support utilities for installer behavioural tests.
//!
//! A [`Sandbox`] is a throwaway filesystem root with its own `bin`, system
//! `bin`, and application directories, wired to in-memory downloads and a
//! version-echoing command executor.

use std::path::{Path, PathBuf};

use but_installer::artefact::extraction::ArchiveExtractor;
use but_installer::artefact::staging::StagingRegistry;
use but_installer::config::InstallerConfig;
use but_installer::install::InstallManager;
use but_installer::output::Reporter;
use but_installer::platform::{Arch, Os, PackageKind, PlatformDescriptor};
use but_installer::test_utils::{StubDownloader, VersionEchoExecutor, write_executable};
use camino::Utf8PathBuf;
use tempfile::TempDir;

/// An isolated install root.
pub struct Sandbox {
    pub config: InstallerConfig,
    pub platform: PlatformDescriptor,
    pub downloader: StubDownloader,
    pub executor: VersionEchoExecutor,
    pub registry: &'static StagingRegistry,
    pub quiet: bool,
    // Keep the root alive for the lifetime of the scenario.
    _root: TempDir,
}

impl Sandbox {
    /// Create a sandbox for a Linux host with the given package manager.
    pub fn new(package_kind: PackageKind, arch: &str) -> Self {
        let root = TempDir::new().expect("failed to create sandbox root");
        let base = Utf8PathBuf::from_path_buf(root.path().to_path_buf())
            .expect("sandbox root not UTF-8");
        let bin_dir = base.join("usr/local/bin");
        let system_bin = base.join("usr/bin");

        let config = InstallerConfig {
            bin_dir: bin_dir.clone(),
            app_dir: base.join("opt/gitbutler"),
            search_path: vec![
                bin_dir.into_std_path_buf(),
                system_bin.clone().into_std_path_buf(),
            ],
            use_sudo: false,
            ..InstallerConfig::default()
        };

        Self {
            config,
            platform: PlatformDescriptor {
                os: Os::Linux,
                arch: Arch::parse(arch),
                package_kind,
            },
            downloader: StubDownloader::default(),
            executor: VersionEchoExecutor::installing_packages_to(
                system_bin.join("but").into_std_path_buf(),
            ),
            registry: Box::leak(Box::new(StagingRegistry::new())),
            quiet: false,
            _root: root,
        }
    }

    /// Where this installer places `but`.
    pub fn target(&self) -> PathBuf {
        self.config.target_path().into_std_path_buf()
    }

    /// Directory holding bundled payloads.
    pub fn app_dir(&self) -> &Path {
        self.config.app_dir.as_std_path()
    }

    /// Install a fake `but` at the target that reports `version`.
    pub fn install_binary(&self, version: &str) {
        write_executable(&self.target(), &format!("but {version}\n"))
            .expect("failed to write fake binary");
    }

    /// Borrow everything as an install manager.
    pub fn manager(&self) -> InstallManager<'_> {
        InstallManager {
            config: &self.config,
            platform: &self.platform,
            executor: &self.executor,
            downloader: &self.downloader,
            extractor: &ArchiveExtractor,
            staging_registry: self.registry,
            reporter: Reporter::new(self.quiet),
        }
    }
}
