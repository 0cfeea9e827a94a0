//! Local installation probing.
//!
//! Nothing is persisted between runs. Every invocation re-derives the
//! installed version by running `<binary> --version` and locates the binary
//! on the search path the way a shell would.

use std::path::{Path, PathBuf};

use crate::command::CommandExecutor;
use crate::version::Version;

/// What is currently installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallState {
    /// Version reported by the installed binary; `None` when nothing
    /// answered, which orders as `0.0.0`.
    pub installed_version: Option<Version>,
    /// Where this installer places the binary.
    pub target_path: PathBuf,
    /// First match for the binary name on the search path.
    pub located_at: Option<PathBuf>,
}

impl InstallState {
    /// Installed version, or [`Version::SENTINEL`] when none.
    #[must_use]
    pub fn effective_version(&self) -> Version {
        self.installed_version.unwrap_or(Version::SENTINEL)
    }

    /// Returns true if a `but` binary answered the version probe.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }

    /// Returns true if something exists at the target path, including a
    /// dangling symlink or a binary that fails to run.
    #[must_use]
    pub fn target_exists(&self) -> bool {
        self.target_path.symlink_metadata().is_ok()
    }
}

/// Probe the installation at `target_path`.
///
/// The target path is probed first. When nothing is there, the first match
/// for `binary_name` in `search_path` is probed instead, so a copy installed
/// by other means still counts.
#[must_use]
pub fn probe_install(
    executor: &dyn CommandExecutor,
    target_path: &Path,
    binary_name: &str,
    search_path: &[PathBuf],
) -> InstallState {
    let located_at = find_on_path(binary_name, search_path);
    let probed = if target_path.symlink_metadata().is_ok() {
        Some(target_path)
    } else {
        located_at.as_deref()
    };
    let installed_version = probed.and_then(|path| probe_version(executor, path));

    log::debug!(
        "probe: target={} located_at={:?} version={:?}",
        target_path.display(),
        located_at,
        installed_version
    );

    InstallState {
        installed_version,
        target_path: target_path.to_path_buf(),
        located_at,
    }
}

/// Run `<binary> --version` and extract the first `major.minor.patch`.
///
/// Any failure, including a non-zero exit or output without a version,
/// yields `None`.
#[must_use]
pub fn probe_version(executor: &dyn CommandExecutor, binary: &Path) -> Option<Version> {
    let program = binary.to_str()?;
    match executor.run(program, &["--version"]) {
        Ok(output) if output.status.success() => {
            Version::extract(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            log::debug!(
                "{program} --version exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Err(e) => {
            log::debug!("{program} --version failed: {e}");
            None
        }
    }
}

/// Find the first executable named `binary_name` in `search_path`.
#[must_use]
pub fn find_on_path(binary_name: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    search_path
        .iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(binary_name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{
        ExpectedCall, StubExecutor, VersionEchoExecutor, failure_output, stdout_output,
        write_executable,
    };
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn bin_dir() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[rstest]
    fn nothing_installed(bin_dir: TempDir) {
        let target = bin_dir.path().join("but");
        let state = probe_install(
            &VersionEchoExecutor::default(),
            &target,
            "but",
            &[bin_dir.path().to_path_buf()],
        );
        assert_eq!(state.installed_version, None);
        assert_eq!(state.effective_version(), Version::SENTINEL);
        assert!(!state.is_installed());
        assert!(!state.target_exists());
        assert_eq!(state.located_at, None);
    }

    #[rstest]
    fn installed_at_target(bin_dir: TempDir) {
        let target = bin_dir.path().join("but");
        write_executable(&target, "but 2.2.19\n").expect("binary");
        let state = probe_install(
            &VersionEchoExecutor::default(),
            &target,
            "but",
            &[bin_dir.path().to_path_buf()],
        );
        assert_eq!(state.installed_version, Some(Version::new(2, 2, 19)));
        assert_eq!(state.located_at.as_deref(), Some(target.as_path()));
    }

    #[rstest]
    fn falls_back_to_search_path(bin_dir: TempDir) {
        let elsewhere = tempfile::tempdir().expect("tempdir");
        let other = elsewhere.path().join("but");
        write_executable(&other, "but version 1.4.0 (abc123)").expect("binary");
        let state = probe_install(
            &VersionEchoExecutor::default(),
            &bin_dir.path().join("but"),
            "but",
            &[PathBuf::new(), elsewhere.path().to_path_buf()],
        );
        assert_eq!(state.installed_version, Some(Version::new(1, 4, 0)));
        assert_eq!(state.located_at, Some(other));
    }

    #[rstest]
    fn non_executable_files_are_not_found(bin_dir: TempDir) {
        std::fs::write(bin_dir.path().join("but"), "but 2.2.19").expect("write");
        assert_eq!(find_on_path("but", &[bin_dir.path().to_path_buf()]), None);
    }

    #[rstest]
    #[case::failing_binary(Ok(failure_output("segfault")))]
    #[case::no_version_in_output(Ok(stdout_output("but: unknown flag")))]
    #[case::spawn_error(Err(crate::error::InstallerError::Io(std::io::Error::from(
        std::io::ErrorKind::PermissionDenied
    ))))]
    fn probe_failures_mean_not_installed(
        #[case] result: crate::error::Result<std::process::Output>,
    ) {
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: "/usr/local/bin/but",
            args: vec!["--version"],
            result,
        }]);
        assert_eq!(
            probe_version(&executor, Path::new("/usr/local/bin/but")),
            None
        );
        executor.assert_finished();
    }
}
