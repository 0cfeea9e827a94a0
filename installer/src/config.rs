//! Installer settings and environment overrides.
//!
//! Defaults are compiled in. Each setting except the trusted download origin
//! can be overridden through a `BUT_INSTALLER_*` environment variable, which
//! is how the behaviour tests redirect installs into temporary directories.

use camino::Utf8PathBuf;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{InstallerError, Result};
use crate::platform::PackageKind;

/// Release feed queried when no override is set.
pub const DEFAULT_FEED_URL: &str = "https://app.gitbutler.com/api/downloads?limit=1&channel=release";

/// Directory receiving the `but` binary or symlink.
pub const DEFAULT_BIN_DIR: &str = "/usr/local/bin";

/// Directory receiving unpacked archive payloads.
pub const DEFAULT_APP_DIR: &str = "/opt/gitbutler";

/// File name of the installed binary.
pub const BINARY_NAME: &str = "but";

/// Overrides [`DEFAULT_FEED_URL`].
pub const FEED_URL_ENV: &str = "BUT_INSTALLER_FEED_URL";
/// Overrides [`DEFAULT_BIN_DIR`].
pub const BIN_DIR_ENV: &str = "BUT_INSTALLER_BIN_DIR";
/// Overrides [`DEFAULT_APP_DIR`].
pub const APP_DIR_ENV: &str = "BUT_INSTALLER_APP_DIR";
/// Forces a package kind instead of probing for `dpkg` and `rpm`.
pub const PACKAGE_KIND_ENV: &str = "BUT_INSTALLER_PACKAGE_KIND";

/// Resolved installer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
    /// Release feed URL.
    pub feed_url: String,
    /// Directory holding the installed binary or symlink.
    pub bin_dir: Utf8PathBuf,
    /// Directory holding unpacked archive payloads.
    pub app_dir: Utf8PathBuf,
    /// File name of the installed binary.
    pub binary_name: String,
    /// Directories searched when verifying the binary is reachable.
    pub search_path: Vec<PathBuf>,
    /// Run package managers through `sudo`.
    pub use_sudo: bool,
    /// Package kind override; `None` probes the host.
    pub package_kind: Option<PackageKind>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_owned(),
            bin_dir: Utf8PathBuf::from(DEFAULT_BIN_DIR),
            app_dir: Utf8PathBuf::from(DEFAULT_APP_DIR),
            binary_name: BINARY_NAME.to_owned(),
            search_path: Vec::new(),
            use_sudo: false,
            package_kind: None,
        }
    }
}

impl InstallerConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Config`] if an override is not valid UTF-8,
    /// is empty, or names an unknown package kind.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var_os(key))?;
        config.use_sudo = !running_as_root();
        Ok(config)
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// `PATH` populates the search path. Privilege escalation is left off;
    /// [`InstallerConfig::from_env`] decides it from the effective user.
    ///
    /// # Errors
    ///
    /// See [`InstallerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = utf8_override(&lookup, FEED_URL_ENV)? {
            config.feed_url = url;
        }
        if let Some(dir) = utf8_override(&lookup, BIN_DIR_ENV)? {
            config.bin_dir = Utf8PathBuf::from(dir);
        }
        if let Some(dir) = utf8_override(&lookup, APP_DIR_ENV)? {
            config.app_dir = Utf8PathBuf::from(dir);
        }
        if let Some(kind) = utf8_override(&lookup, PACKAGE_KIND_ENV)? {
            let parsed = kind.parse::<PackageKind>().map_err(|e| InstallerError::Config {
                reason: format!("{PACKAGE_KIND_ENV}: {e}"),
            })?;
            config.package_kind = Some(parsed);
        }
        if let Some(path) = lookup("PATH") {
            config.search_path = std::env::split_paths(&path).collect();
        }

        Ok(config)
    }

    /// Path of the installed binary or symlink.
    #[must_use]
    pub fn target_path(&self) -> Utf8PathBuf {
        self.bin_dir.join(&self.binary_name)
    }

    /// File name suffix identifying the payload inside an archive.
    ///
    /// Application image hosts look for the bundled `.AppImage`; every other
    /// host looks for the bare binary.
    #[must_use]
    pub fn payload_suffix(&self, package_kind: PackageKind) -> &str {
        match package_kind {
            PackageKind::AppImage => ".AppImage",
            PackageKind::NativeBinary | PackageKind::Deb | PackageKind::Rpm => &self.binary_name,
        }
    }
}

fn utf8_override(
    lookup: &impl Fn(&str) -> Option<OsString>,
    key: &str,
) -> Result<Option<String>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = raw.into_string().map_err(|_| InstallerError::Config {
        reason: format!("{key} is not valid UTF-8"),
    })?;
    if value.trim().is_empty() {
        return Err(InstallerError::Config {
            reason: format!("{key} is set but empty"),
        });
    }
    log::debug!("{key} overrides default: {value}");
    Ok(Some(value))
}

/// Returns true when the effective user is root.
#[cfg(unix)]
#[must_use]
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Returns true when the effective user is root.
#[cfg(not(unix))]
#[must_use]
pub const fn running_as_root() -> bool {
    false
}
