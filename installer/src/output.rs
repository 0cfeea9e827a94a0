//! User-facing progress and warning output.
//!
//! Everything the user reads goes to stderr. Progress lines are suppressed
//! by `--quiet`; security warnings are not.

use std::fmt::Display;
use std::io::Write;
use std::path::Path;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; a closed stderr must not abort the install.
    }
}

/// Quiet-aware writer for progress and warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    /// Create a reporter; `quiet` suppresses progress lines.
    #[must_use]
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Write a progress line unless quiet.
    pub fn info(self, stderr: &mut dyn Write, message: impl Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }

    /// Write a warning line, even when quiet.
    pub fn warn(self, stderr: &mut dyn Write, message: impl Display) {
        write_stderr_line(stderr, format_args!("warning: {message}"));
    }
}

/// The warning shown for every download, since the feed publishes no
/// checksums to verify against.
///
/// # Examples
///
/// ```
/// use but_installer::output::checksum_warning;
///
/// let text = checksum_warning("https://releases.gitbutler.com/x/but", "ab12");
/// assert!(text.contains("not verified"));
/// assert!(text.contains("ab12"));
/// ```
#[must_use]
pub fn checksum_warning(url: &str, sha256: &str) -> String {
    format!(
        concat!(
            "the release feed publishes no checksums, so {} was not verified\n",
            "         beyond its origin. SHA-256 of the download: {}"
        ),
        url, sha256
    )
}

/// Instructions for adding `bin_dir` to `PATH`.
#[must_use]
pub fn path_instructions(bin_dir: &Path) -> String {
    format!(
        concat!(
            "Add the following to your shell profile (~/.bashrc or ~/.zshrc):\n",
            "  export PATH=\"{}:$PATH\""
        ),
        bin_dir.display()
    )
}
