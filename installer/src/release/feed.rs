//! Release feed schema and parsing.
//!
//! The feed is a JSON array of releases, newest first. Only element 0 is
//! used. Each release carries a `version` and a list of `builds`:
//!
//! ```json
//! [{"version": "2.2.19",
//!   "builds": [{"os": "linux", "arch": "x86_64", "file": "but",
//!               "url": "https://releases.gitbutler.com/..."}]}]
//! ```
//!
//! Unknown fields are ignored so the feed can grow without breaking older
//! installers.

use crate::artefact::extraction::ArchiveFormat;
use crate::error::{InstallerError, Result};
use crate::platform::{Arch, Os};
use crate::version::Version;
use serde::Deserialize;
use std::fmt;

/// How an artefact file is installed, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Debian package.
    Deb,
    /// RPM package.
    Rpm,
    /// A single runnable file.
    Binary,
    /// A compressed bundle that must be unpacked first.
    Archive(ArchiveFormat),
}

impl FileKind {
    /// Classify a file name.
    ///
    /// # Examples
    ///
    /// ```
    /// use but_installer::artefact::extraction::ArchiveFormat;
    /// use but_installer::release::feed::FileKind;
    ///
    /// assert_eq!(FileKind::from_filename("but_2.2.19_amd64.deb"), FileKind::Deb);
    /// assert_eq!(FileKind::from_filename("but"), FileKind::Binary);
    /// assert_eq!(
    ///     FileKind::from_filename("but.tar.gz"),
    ///     FileKind::Archive(ArchiveFormat::TarGz)
    /// );
    /// ```
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".deb") {
            Self::Deb
        } else if lower.ends_with(".rpm") {
            Self::Rpm
        } else if let Some(format) = ArchiveFormat::from_filename(&lower) {
            Self::Archive(format)
        } else {
            Self::Binary
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deb => f.write_str("deb"),
            Self::Rpm => f.write_str("rpm"),
            Self::Binary => f.write_str("binary"),
            Self::Archive(format) => write!(f, "{format} archive"),
        }
    }
}

/// One downloadable build of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtefact {
    /// Target architecture.
    pub arch: Arch,
    /// Target operating system, when the feed states one.
    pub os: Option<Os>,
    /// Installation mechanism implied by the file name.
    pub file_kind: FileKind,
    /// Download URL.
    pub url: String,
    /// File name used when staging the download.
    pub filename: String,
}

/// The latest release described by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Release version.
    pub version: Version,
    /// Builds in feed order.
    pub builds: Vec<BuildArtefact>,
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    version: Version,
    #[serde(default)]
    builds: Vec<RawBuild>,
}

#[derive(Debug, Deserialize)]
struct RawBuild {
    arch: String,
    file: String,
    url: String,
    #[serde(default)]
    os: Option<String>,
}

impl From<RawBuild> for BuildArtefact {
    fn from(raw: RawBuild) -> Self {
        let filename = if raw.file.is_empty() {
            raw.url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_owned()
        } else {
            raw.file
        };
        Self {
            arch: Arch::parse(&raw.arch),
            os: raw.os.as_deref().map(Os::parse),
            file_kind: FileKind::from_filename(&filename),
            url: raw.url,
            filename,
        }
    }
}

/// Parse a feed body into the latest [`ReleaseInfo`].
///
/// # Errors
///
/// Returns [`InstallerError::Parse`] if the body is not a JSON array of
/// releases, the array is empty, or the first release has a missing or
/// malformed `version`.
///
/// # Examples
///
/// ```
/// use but_installer::release::feed::parse_feed;
///
/// let body = r#"[{"version":"2.2.19","builds":[
///     {"arch":"x86_64","file":"but","url":"https://releases.gitbutler.com/x/but"}]}]"#;
/// let release = parse_feed(body).expect("valid feed");
/// assert_eq!(release.version.to_string(), "2.2.19");
/// assert_eq!(release.builds.len(), 1);
/// ```
pub fn parse_feed(body: &str) -> Result<ReleaseInfo> {
    let releases: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| InstallerError::Parse {
            reason: e.to_string(),
        })?;
    let latest = releases
        .into_iter()
        .next()
        .ok_or_else(|| InstallerError::Parse {
            reason: "feed contains no releases".to_owned(),
        })?;
    let raw: RawRelease = serde_json::from_value(latest).map_err(|e| InstallerError::Parse {
        reason: format!("latest release: {e}"),
    })?;

    Ok(ReleaseInfo {
        version: raw.version,
        builds: raw.builds.into_iter().map(BuildArtefact::from).collect(),
    })
}
