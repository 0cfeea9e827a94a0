//! Host platform detection.
//!
//! The installer needs three facts about the host: the operating system,
//! the CPU architecture, and the preferred package mechanism. They are
//! computed once at startup into an immutable [`PlatformDescriptor`] that is
//! passed to the resolver and install manager.

use crate::command::{CommandExecutor, command_succeeds};
use std::fmt;
use std::str::FromStr;

/// Operating system family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux, the only family with published builds.
    Linux,
    /// Any other operating system, by its Rust `target_os` name.
    Other(String),
}

impl Os {
    /// The operating system this binary was compiled for.
    #[must_use]
    pub fn host() -> Self {
        Self::parse(std::env::consts::OS)
    }

    /// Parse an OS name as it appears in the release feed.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "linux" => Self::Linux,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86 (`x86_64`, `amd64`).
    X86_64,
    /// 64-bit ARM (`aarch64`, `arm64`).
    Aarch64,
    /// Any other architecture, lower-cased.
    Other(String),
}

impl Arch {
    /// The architecture this binary was compiled for.
    #[must_use]
    pub fn host() -> Self {
        Self::parse(std::env::consts::ARCH)
    }

    /// Parse an architecture name, accepting Debian-style aliases.
    ///
    /// # Examples
    ///
    /// ```
    /// use but_installer::platform::Arch;
    ///
    /// assert_eq!(Arch::parse("amd64"), Arch::X86_64);
    /// assert_eq!(Arch::parse("arm64"), Arch::Aarch64);
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Self::X86_64,
            "aarch64" | "arm64" => Self::Aarch64,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Canonical feed spelling of the architecture.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The installation mechanism preferred on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// A single executable copied into the bin directory.
    NativeBinary,
    /// A Debian package handed to `dpkg`.
    Deb,
    /// An RPM package handed to `rpm`.
    Rpm,
    /// A bundled application image unpacked into the application directory.
    AppImage,
}

impl PackageKind {
    /// Configuration spelling of the package kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NativeBinary => "binary",
            Self::Deb => "deb",
            Self::Rpm => "rpm",
            Self::AppImage => "appimage",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a package kind override is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown package kind \"{0}\"; expected one of: binary, deb, rpm, appimage")]
pub struct UnknownPackageKind(pub String);

impl FromStr for PackageKind {
    type Err = UnknownPackageKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "binary" | "native" | "native-binary" => Ok(Self::NativeBinary),
            "deb" | "dpkg" => Ok(Self::Deb),
            "rpm" => Ok(Self::Rpm),
            "appimage" => Ok(Self::AppImage),
            _ => Err(UnknownPackageKind(raw.to_owned())),
        }
    }
}

/// Immutable description of the host, computed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    /// Operating system family.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
    /// Preferred installation mechanism.
    pub package_kind: PackageKind,
}

impl PlatformDescriptor {
    /// Describe the host, probing for `dpkg` and `rpm` unless
    /// `package_kind_override` is given.
    #[must_use]
    pub fn detect(
        executor: &dyn CommandExecutor,
        package_kind_override: Option<PackageKind>,
    ) -> Self {
        let package_kind =
            package_kind_override.unwrap_or_else(|| detect_package_kind(executor));
        let platform = Self {
            os: Os::host(),
            arch: Arch::host(),
            package_kind,
        };
        log::debug!(
            "detected platform: os={} arch={} package_kind={}",
            platform.os,
            platform.arch,
            platform.package_kind
        );
        platform
    }
}

/// Choose the host package kind from the package managers available.
///
/// `dpkg` wins over `rpm` when both are installed, matching Debian-family
/// hosts that ship `rpm` as an auxiliary tool.
#[must_use]
pub fn detect_package_kind(executor: &dyn CommandExecutor) -> PackageKind {
    if command_succeeds(executor, "dpkg", &["--version"]) {
        PackageKind::Deb
    } else if command_succeeds(executor, "rpm", &["--version"]) {
        PackageKind::Rpm
    } else {
        PackageKind::NativeBinary
    }
}
