//! Release version parsing and ordering.
//!
//! Versions are plain `major.minor.patch` triples compared numerically, so
//! `0.9.10` sorts after `0.9.9`. Anything that does not parse becomes the
//! `0.0.0` sentinel, which is older than every real release.
//!
//! Pre-release and build metadata are not modelled: a trailing `-beta.1` or
//! `+abc` suffix is discarded before parsing, so `1.2.3-beta.1` and `1.2.3`
//! compare as equal.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// A `major.minor.patch` release version.
///
/// Field order drives the derived ordering, giving numeric comparison
/// component by component.
///
/// # Examples
///
/// ```
/// use but_installer::version::Version;
///
/// assert!(Version::parse("0.9.10") > Version::parse("0.9.9"));
/// assert_eq!(Version::parse("garbage"), Version::SENTINEL);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
}

impl Version {
    /// The version assigned to missing or unparsable strings.
    pub const SENTINEL: Self = Self::new(0, 0, 0);

    /// Construct a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string, returning `None` when it is not a
    /// `major.minor.patch` triple.
    ///
    /// A leading `v` and any `-pre` or `+build` suffix are ignored.
    #[must_use]
    pub fn try_parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = unprefixed
            .split(['-', '+'])
            .next()
            .unwrap_or(unprefixed);

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Parse a version string, falling back to [`Version::SENTINEL`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or(Self::SENTINEL)
    }

    /// Find the first `major.minor.patch` pattern in free-form text, such
    /// as the output of `but --version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use but_installer::version::Version;
    ///
    /// let found = Version::extract("but 2.2.19 (abc1234)");
    /// assert_eq!(found, Some(Version::new(2, 2, 19)));
    /// assert_eq!(Version::extract("command not found"), None);
    /// ```
    #[must_use]
    pub fn extract(text: &str) -> Option<Self> {
        let captures = version_pattern().captures(text)?;
        let component =
            |index: usize| -> Option<u64> { captures.get(index)?.as_str().parse().ok() };
        Some(Self::new(component(1)?, component(2)?, component(3)?))
    }

    /// Returns true for the `0.0.0` sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

/// Compare two version strings numerically.
///
/// Unparsable input compares as `0.0.0`.
///
/// # Examples
///
/// ```
/// use but_installer::version::compare;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare("0.9.10", "0.9.9"), Ordering::Greater);
/// assert_eq!(compare("", "0.0.1"), Ordering::Less);
/// ```
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

#[expect(clippy::expect_used, reason = "the pattern is a literal")]
fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("version pattern compiles"))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl<'de> Deserialize<'de> for Version {
    /// Feed versions must parse; the sentinel is reserved for local probes.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::try_parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid release version \"{raw}\""))
        })
    }
}
