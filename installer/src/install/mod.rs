//! Install, upgrade, skip, and uninstall orchestration.
//!
//! [`InstallManager`] is a small state machine. Every run starts by probing
//! the local installation. An install run then reads the release feed and
//! lands in one of three states:
//!
//! - [`State::UpToDate`]: the installed version is at least the latest
//!   release. Nothing is downloaded.
//! - [`State::Absent`] or [`State::Upgradable`]: proceed to
//!   [`State::Installing`], which fetches the selected build, swaps it into
//!   place through an [`strategy::InstallStrategy`], and re-probes to verify.
//!
//! An uninstall run goes straight to [`State::Uninstalling`].
//!
//! Running the installer twice in a row is safe: the second run finds the
//! release already installed and stops before downloading anything.
//!
//! # Sub-modules
//!
//! - [`strategy`] - Filesystem swap strategies per artefact kind.
//! - [`uninstall`] - Removal flow and the confirmation prompt.

pub mod strategy;
pub mod uninstall;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::extraction::ArtefactExtractor;
use crate::artefact::fetcher::ArtefactFetcher;
use crate::artefact::staging::StagingRegistry;
use crate::command::CommandExecutor;
use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::output::{Reporter, checksum_warning, path_instructions};
use crate::platform::PlatformDescriptor;
use crate::probe::{InstallState, probe_install};
use crate::release::resolver::{ReleaseResolver, select_build};
use crate::version::Version;
use strategy::{StrategyContext, strategy_for};

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No `but` binary answered the version probe.
    Absent,
    /// The installed version is at least the latest release.
    UpToDate,
    /// An older release is installed.
    Upgradable,
    /// Downloading and swapping in the latest release.
    Installing,
    /// Removing the installation.
    Uninstalling,
}

/// Compare the installed version with the latest release.
///
/// Returns [`State::Absent`], [`State::UpToDate`], or
/// [`State::Upgradable`]. A newer local build counts as up to date; the
/// installer never downgrades.
///
/// # Examples
///
/// ```
/// use but_installer::install::{State, decide};
/// use but_installer::version::Version;
///
/// let latest = Version::new(2, 2, 19);
/// assert_eq!(decide(None, latest), State::Absent);
/// assert_eq!(decide(Some(Version::new(2, 2, 18)), latest), State::Upgradable);
/// assert_eq!(decide(Some(latest), latest), State::UpToDate);
/// ```
#[must_use]
pub fn decide(installed: Option<Version>, latest: Version) -> State {
    match installed {
        None => State::Absent,
        Some(current) if current >= latest => State::UpToDate,
        Some(_) => State::Upgradable,
    }
}

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A fresh install.
    Installed {
        /// Installed release.
        version: Version,
        /// Path the user runs.
        path: PathBuf,
    },
    /// An older release was replaced.
    Upgraded {
        /// Previously installed release.
        from: Version,
        /// Newly installed release.
        to: Version,
        /// Path the user runs.
        path: PathBuf,
    },
    /// Nothing to do.
    UpToDate {
        /// Installed release.
        installed: Version,
        /// Latest published release.
        latest: Version,
    },
    /// The installation was removed.
    Uninstalled {
        /// Paths that were deleted.
        removed: Vec<PathBuf>,
    },
    /// Uninstall found nothing to remove.
    NothingToUninstall,
    /// The user declined the uninstall prompt.
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed { version, path } => {
                write!(f, "Installed but {version} to {}.", path.display())
            }
            Self::Upgraded { from, to, path } => {
                write!(f, "Upgraded but from {from} to {to} at {}.", path.display())
            }
            Self::UpToDate { installed, latest } if installed == latest => {
                write!(f, "but {installed} is already up to date.")
            }
            Self::UpToDate { installed, latest } => write!(
                f,
                "but {installed} is installed, which is newer than the latest release {latest}; nothing to do."
            ),
            Self::Uninstalled { .. } => f.write_str("Uninstalled but."),
            Self::NothingToUninstall => f.write_str("but is not installed; nothing to remove."),
            Self::Cancelled => f.write_str("Uninstall cancelled."),
        }
    }
}

/// Everything an install or uninstall run needs.
pub struct InstallManager<'a> {
    /// Installer settings.
    pub config: &'a InstallerConfig,
    /// Host description.
    pub platform: &'a PlatformDescriptor,
    /// Runs version probes and package managers.
    pub executor: &'a dyn CommandExecutor,
    /// Fetches the feed and artefacts.
    pub downloader: &'a dyn ArtefactDownloader,
    /// Unpacks archive artefacts.
    pub extractor: &'a dyn ArtefactExtractor,
    /// Tracks staging areas for interrupt cleanup.
    pub staging_registry: &'static StagingRegistry,
    /// Progress and warning output.
    pub reporter: Reporter,
}

impl InstallManager<'_> {
    /// Probe the current installation.
    #[must_use]
    pub fn probe(&self) -> InstallState {
        probe_install(
            self.executor,
            self.config.target_path().as_std_path(),
            &self.config.binary_name,
            &self.config.search_path,
        )
    }

    /// Install or upgrade to the latest release, or do nothing if it is
    /// already installed.
    ///
    /// # Errors
    ///
    /// Returns the first error from resolving, fetching, swapping, or
    /// verifying. Nothing is rolled back.
    pub fn install(&self, stderr: &mut dyn Write) -> Result<Outcome> {
        let before = self.probe();
        self.reporter
            .info(stderr, "Checking for the latest release of but...");
        let release = ReleaseResolver::new(self.downloader, &self.config.feed_url).fetch_release()?;

        let state = decide(before.installed_version, release.version);
        log::debug!(
            "state {state:?}: installed {} latest {}",
            before.effective_version(),
            release.version
        );
        if state == State::UpToDate {
            return Ok(Outcome::UpToDate {
                installed: before.effective_version(),
                latest: release.version,
            });
        }

        let build = select_build(&release, self.platform)?;
        log::debug!("state {:?}: {}", State::Installing, build.url);
        self.reporter.info(
            stderr,
            format_args!("Downloading but {} ({})...", release.version, build.filename),
        );
        let fetched =
            ArtefactFetcher::with_registry(self.downloader, self.extractor, self.staging_registry)
                .fetch(&build, self.config.payload_suffix(self.platform.package_kind))?;
        self.reporter
            .warn(stderr, checksum_warning(&build.url, &fetched.sha256));

        let strategy = strategy_for(build.file_kind);
        log::debug!("installing with the {} strategy", strategy.name());
        let swapped = strategy.install(
            &fetched.payload,
            &StrategyContext {
                config: self.config,
                executor: self.executor,
                registry: self.staging_registry,
            },
        )?;
        drop(fetched);
        log::debug!("swapped in {}", swapped.display());

        let path = self.verify(release.version, stderr)?;
        Ok(match before.installed_version {
            Some(from) => Outcome::Upgraded {
                from,
                to: release.version,
                path,
            },
            None => Outcome::Installed {
                version: release.version,
                path,
            },
        })
    }

    /// Re-probe after a swap and confirm `expected` is what runs.
    ///
    /// Returns where the new binary lives: the target path when something
    /// is there, otherwise wherever the package manager put it.
    fn verify(&self, expected: Version, stderr: &mut dyn Write) -> Result<PathBuf> {
        let after = self.probe();
        if after.installed_version != Some(expected) {
            let found = after
                .installed_version
                .map_or_else(|| "no working binary".to_owned(), |v| format!("version {v}"));
            return Err(InstallerError::Verification {
                reason: format!("expected but {expected} but found {found}"),
            });
        }

        let Some(located) = after.located_at.as_deref() else {
            let bin_dir = self.config.bin_dir.as_std_path();
            return Err(InstallerError::Verification {
                reason: format!(
                    "but is not on the search path\n{}",
                    path_instructions(bin_dir)
                ),
            });
        };
        if !after.target_exists() {
            return Ok(located.to_path_buf());
        }
        if located != after.target_path {
            self.reporter.warn(
                stderr,
                format_args!(
                    "{} comes first on PATH and shadows {}",
                    located.display(),
                    after.target_path.display()
                ),
            );
        }
        Ok(after.target_path)
    }
}
