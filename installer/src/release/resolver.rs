//! Release resolution: from feed to one trusted artefact.
//!
//! Selection is a fixed, total order rather than a scored heuristic. Builds
//! are filtered by architecture (and operating system, when the feed states
//! one), then grouped into tiers by file kind. The first tier with any
//! candidate wins, and within a tier the first build in feed order wins, so
//! the same feed always yields the same artefact.
//!
//! The selected URL must start with [`TRUSTED_ORIGIN`]. The feed carries no
//! checksums, so this prefix check is the only integrity control and cannot
//! be configured away.

use super::feed::{BuildArtefact, FileKind, ReleaseInfo, parse_feed};
use crate::artefact::download::ArtefactDownloader;
use crate::error::{InstallerError, Result};
use crate::platform::{PackageKind, PlatformDescriptor};

/// The only origin artefacts may be downloaded from.
pub const TRUSTED_ORIGIN: &str = "https://releases.gitbutler.com/";

/// A selection tier, matched against [`FileKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Debian package.
    Deb,
    /// RPM package.
    Rpm,
    /// Single-file binary.
    Binary,
    /// Compressed bundle in any supported format.
    Archive,
}

impl Tier {
    /// Returns true if a build of `kind` belongs to this tier.
    #[must_use]
    pub const fn accepts(self, kind: FileKind) -> bool {
        matches!(
            (self, kind),
            (Self::Deb, FileKind::Deb)
                | (Self::Rpm, FileKind::Rpm)
                | (Self::Binary, FileKind::Binary)
                | (Self::Archive, FileKind::Archive(_))
        )
    }
}

/// Tier order for a host package kind.
///
/// Native package first, then a direct binary, then an archive. Hosts that
/// prefer application images look at archives before bare binaries.
#[must_use]
pub const fn tier_order(package_kind: PackageKind) -> &'static [Tier] {
    match package_kind {
        PackageKind::Deb => &[Tier::Deb, Tier::Binary, Tier::Archive],
        PackageKind::Rpm => &[Tier::Rpm, Tier::Binary, Tier::Archive],
        PackageKind::NativeBinary => &[Tier::Binary, Tier::Archive],
        PackageKind::AppImage => &[Tier::Archive, Tier::Binary],
    }
}

/// Pick the build to install for `platform` and check its origin.
///
/// # Errors
///
/// Returns [`InstallerError::NoCompatibleBuild`] if no build matches the
/// platform in any tier, and [`InstallerError::UntrustedSource`] if the
/// selected build's URL is outside [`TRUSTED_ORIGIN`].
pub fn select_build(release: &ReleaseInfo, platform: &PlatformDescriptor) -> Result<BuildArtefact> {
    let runs_here = |build: &&BuildArtefact| {
        build.arch == platform.arch && build.os.as_ref().is_none_or(|os| *os == platform.os)
    };

    let selected = tier_order(platform.package_kind)
        .iter()
        .find_map(|tier| {
            release
                .builds
                .iter()
                .filter(runs_here)
                .find(|build| tier.accepts(build.file_kind))
        })
        .ok_or_else(|| InstallerError::NoCompatibleBuild {
            arch: platform.arch.to_string(),
        })?;

    ensure_trusted(&selected.url)?;
    log::debug!(
        "selected {} ({}) for {}",
        selected.filename,
        selected.file_kind,
        platform.arch
    );
    Ok(selected.clone())
}

/// Reject URLs that do not start with [`TRUSTED_ORIGIN`].
///
/// # Errors
///
/// Returns [`InstallerError::UntrustedSource`] on mismatch.
///
/// # Examples
///
/// ```
/// use but_installer::release::resolver::ensure_trusted;
///
/// assert!(ensure_trusted("https://releases.gitbutler.com/x/but").is_ok());
/// assert!(ensure_trusted("https://releases.gitbutler.com.evil.example/but").is_err());
/// ```
pub fn ensure_trusted(url: &str) -> Result<()> {
    if url.starts_with(TRUSTED_ORIGIN) {
        Ok(())
    } else {
        Err(InstallerError::UntrustedSource {
            url: url.to_owned(),
            origin: TRUSTED_ORIGIN,
        })
    }
}

/// Fetches the release feed and resolves artefacts from it.
pub struct ReleaseResolver<'a> {
    downloader: &'a dyn ArtefactDownloader,
    feed_url: &'a str,
}

impl<'a> ReleaseResolver<'a> {
    /// Create a resolver reading the feed at `feed_url`.
    #[must_use]
    pub const fn new(downloader: &'a dyn ArtefactDownloader, feed_url: &'a str) -> Self {
        Self {
            downloader,
            feed_url,
        }
    }

    /// Fetch and parse the latest release.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Fetch`] on transport failure or an empty
    /// body, and [`InstallerError::Parse`] on a malformed feed.
    pub fn fetch_release(&self) -> Result<ReleaseInfo> {
        let body = self
            .downloader
            .download_feed(self.feed_url)
            .map_err(|e| InstallerError::Fetch {
                url: self.feed_url.to_owned(),
                reason: e.to_string(),
            })?;
        if body.trim().is_empty() {
            return Err(InstallerError::Fetch {
                url: self.feed_url.to_owned(),
                reason: "empty response body".to_owned(),
            });
        }
        let release = parse_feed(&body)?;
        log::debug!(
            "latest release {} with {} build(s)",
            release.version,
            release.builds.len()
        );
        Ok(release)
    }

    /// Fetch the feed and pick the artefact for `platform`.
    ///
    /// The install flow calls [`ReleaseResolver::fetch_release`] and
    /// [`select_build`] separately so it can stop after the version check
    /// without selecting a build.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ReleaseResolver::fetch_release`] and
    /// [`select_build`].
    pub fn resolve(&self, platform: &PlatformDescriptor) -> Result<BuildArtefact> {
        let release = self.fetch_release()?;
        select_build(&release, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::download::{DownloadError, MockArtefactDownloader};
    use crate::artefact::extraction::ArchiveFormat;
    use crate::platform::{Arch, Os};
    use crate::test_utils::release_feed_json;
    use rstest::{fixture, rstest};

    const FEED_URL: &str = "https://app.gitbutler.com/releases";

    fn platform(arch: Arch, package_kind: PackageKind) -> PlatformDescriptor {
        PlatformDescriptor {
            os: Os::Linux,
            arch,
            package_kind,
        }
    }

    #[fixture]
    fn mixed_release() -> ReleaseInfo {
        parse_feed(&release_feed_json(
            "2.2.19",
            &[
                ("x86_64", "but.tar.gz", "https://releases.gitbutler.com/r/but.tar.gz"),
                ("x86_64", "but", "https://releases.gitbutler.com/r/but"),
                ("x86_64", "but_2.2.19_amd64.deb", "https://releases.gitbutler.com/r/but.deb"),
                ("aarch64", "but", "https://releases.gitbutler.com/r/arm/but"),
            ],
        ))
        .expect("valid feed")
    }

    #[rstest]
    #[case::deb_host(PackageKind::Deb, FileKind::Deb)]
    #[case::rpm_host_falls_back_to_binary(PackageKind::Rpm, FileKind::Binary)]
    #[case::binary_host(PackageKind::NativeBinary, FileKind::Binary)]
    #[case::appimage_host(PackageKind::AppImage, FileKind::Archive(ArchiveFormat::TarGz))]
    fn selects_by_tier(
        mixed_release: ReleaseInfo,
        #[case] package_kind: PackageKind,
        #[case] expected: FileKind,
    ) {
        let build = select_build(&mixed_release, &platform(Arch::X86_64, package_kind))
            .expect("compatible build");
        assert_eq!(build.file_kind, expected);
        assert_eq!(build.arch, Arch::X86_64);
    }

    #[rstest]
    fn selection_is_deterministic(mixed_release: ReleaseInfo) {
        let host = platform(Arch::X86_64, PackageKind::NativeBinary);
        let first = select_build(&mixed_release, &host).expect("first");
        let second = select_build(&mixed_release, &host).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn first_build_in_feed_order_wins_within_tier() {
        let release = parse_feed(&release_feed_json(
            "1.0.0",
            &[
                ("x86_64", "but", "https://releases.gitbutler.com/first/but"),
                ("x86_64", "but", "https://releases.gitbutler.com/second/but"),
            ],
        ))
        .expect("valid feed");
        let build = select_build(&release, &platform(Arch::X86_64, PackageKind::NativeBinary))
            .expect("compatible build");
        assert!(build.url.contains("/first/"));
    }

    #[rstest]
    fn missing_arch_is_no_compatible_build(mixed_release: ReleaseInfo) {
        let host = platform(Arch::Other("riscv64".to_owned()), PackageKind::Deb);
        let err = select_build(&mixed_release, &host).expect_err("no build");
        assert!(
            matches!(err, InstallerError::NoCompatibleBuild { ref arch } if arch == "riscv64"),
            "got {err:?}"
        );
    }

    #[test]
    fn builds_for_other_operating_systems_are_skipped() {
        let body = r#"[{"version":"1.0.0","builds":[
            {"os":"darwin","arch":"aarch64","file":"but","url":"https://releases.gitbutler.com/mac/but"}]}]"#;
        let release = parse_feed(body).expect("valid feed");
        let err = select_build(&release, &platform(Arch::Aarch64, PackageKind::NativeBinary))
            .expect_err("darwin build must not match linux");
        assert!(matches!(err, InstallerError::NoCompatibleBuild { .. }));
    }

    #[rstest]
    #[case("https://evil.example.com/but")]
    #[case("http://releases.gitbutler.com/x/but")]
    #[case("https://releases.gitbutler.com.evil.example/but")]
    fn perfect_match_with_untrusted_url_is_rejected(#[case] url: &str) {
        let release = parse_feed(&release_feed_json("2.2.19", &[("x86_64", "but", url)]))
            .expect("valid feed");
        let err = select_build(&release, &platform(Arch::X86_64, PackageKind::NativeBinary))
            .expect_err("untrusted");
        assert!(
            matches!(err, InstallerError::UntrustedSource { url: ref rejected, .. } if rejected == url),
            "got {err:?}"
        );
    }

    #[test]
    fn resolve_fetches_then_selects() {
        let body = release_feed_json(
            "2.2.19",
            &[("x86_64", "but", "https://releases.gitbutler.com/x/but")],
        );
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download_feed()
            .times(1)
            .returning(move |_| Ok(body.clone()));
        downloader.expect_download_artefact().never();

        let resolver = ReleaseResolver::new(&downloader, FEED_URL);
        let build = resolver
            .resolve(&platform(Arch::X86_64, PackageKind::NativeBinary))
            .expect("resolved");
        assert_eq!(build.url, "https://releases.gitbutler.com/x/but");
    }

    #[rstest]
    #[case::transport(Err(DownloadError::HttpError {
        url: FEED_URL.to_owned(),
        reason: "connection refused".to_owned(),
    }))]
    #[case::empty_body(Ok("  \n".to_owned()))]
    fn fetch_failures_are_fetch_errors(#[case] response: std::result::Result<String, DownloadError>) {
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download_feed()
            .return_once(move |_| response);

        let err = ReleaseResolver::new(&downloader, FEED_URL)
            .fetch_release()
            .expect_err("fetch should fail");
        assert!(matches!(err, InstallerError::Fetch { .. }), "got {err:?}");
    }
}
