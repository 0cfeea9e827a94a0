//! Error types for the `but` installer CLI.
//!
//! Every variant is terminal for the current invocation: the installer never
//! retries on its own, and the top-level handler in `main.rs` prints the
//! message and exits non-zero.

use crate::artefact::download::DownloadError;
use crate::artefact::extraction::ExtractionError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while resolving, fetching, installing, or removing
/// the `but` binary.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The release feed could not be retrieved or returned an empty body.
    #[error("failed to fetch release feed from {url}: {reason}")]
    Fetch {
        /// Feed URL that was requested.
        url: String,
        /// Description of the transport failure.
        reason: String,
    },

    /// The release feed was retrieved but is not usable.
    #[error("failed to parse release feed: {reason}")]
    Parse {
        /// Description of the parse failure.
        reason: String,
    },

    /// No build in the latest release matches the host platform.
    #[error("no compatible build found for architecture {arch}")]
    NoCompatibleBuild {
        /// The host architecture that was searched for.
        arch: String,
    },

    /// The selected build points outside the trusted download origin.
    #[error("refusing to download from untrusted source {url}; downloads must start with {origin}")]
    UntrustedSource {
        /// The rejected URL.
        url: String,
        /// The allow-listed origin prefix.
        origin: &'static str,
    },

    /// The artefact download failed.
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    /// The artefact download produced a zero-length file.
    #[error("downloaded artefact {} is empty", path.display())]
    EmptyArtefact {
        /// Path of the empty staged file.
        path: PathBuf,
    },

    /// The artefact archive could not be unpacked.
    #[error("failed to extract {archive}: {source}")]
    Extraction {
        /// File name of the archive.
        archive: String,
        /// The underlying extraction error.
        #[source]
        source: ExtractionError,
    },

    /// The unpacked archive did not contain the expected payload.
    #[error("no file ending in \"{suffix}\" found in the extracted archive")]
    PayloadNotFound {
        /// Suffix the payload file name was expected to end with.
        suffix: String,
    },

    /// The operating system denied a filesystem mutation.
    #[error("permission denied while {action} {}; re-run with sudo", path.display())]
    Permission {
        /// What the installer was doing (for example "removing").
        action: &'static str,
        /// The path that could not be modified.
        path: PathBuf,
    },

    /// The post-install probe did not find the expected release.
    #[error("installation verification failed: {reason}")]
    Verification {
        /// Description of the mismatch.
        reason: String,
    },

    /// The platform package manager rejected the package.
    #[error("{manager} failed to install {}: {message}", package.display())]
    PackageManager {
        /// Package manager command (`dpkg` or `rpm`).
        manager: &'static str,
        /// Path of the package that was handed over.
        package: PathBuf,
        /// Captured stderr of the package manager.
        message: String,
    },

    /// A configuration override could not be applied.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Description of the invalid setting.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl InstallerError {
    /// Classify an I/O failure on `path`, surfacing permission problems as
    /// [`InstallerError::Permission`].
    ///
    /// # Examples
    ///
    /// ```
    /// use but_installer::error::InstallerError;
    /// use std::io::{Error, ErrorKind};
    /// use std::path::Path;
    ///
    /// let err = InstallerError::from_fs(
    ///     "removing",
    ///     Path::new("/usr/local/bin/but"),
    ///     Error::from(ErrorKind::PermissionDenied),
    /// );
    /// assert!(matches!(err, InstallerError::Permission { .. }));
    /// ```
    #[must_use]
    pub fn from_fs(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::Permission {
                action,
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(source)
        }
    }

    /// Returns true for errors that must be shown even in quiet mode.
    #[must_use]
    pub const fn is_security_relevant(&self) -> bool {
        matches!(self, Self::UntrustedSource { .. })
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
