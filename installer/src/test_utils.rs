//! Shared test utilities for the installer crate.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::command::CommandExecutor;
use crate::error::{InstallerError, Result};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    stdout_output("")
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "dpkg").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let Some(call) = expected.pop_front() else {
            return Err(InstallerError::StubMismatch {
                message: format!("unexpected command invocation: {cmd} {}", args.join(" ")),
            });
        };

        if call.cmd != cmd || call.args.as_slice() != args {
            return Err(InstallerError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{cmd} {}`",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }

        call.result
    }
}

/// A `CommandExecutor` that answers `<path> --version` by echoing the
/// contents of the file at `<path>`.
///
/// Tests install plain-text "binaries" such as `but 2.2.19` and probe them
/// without executing anything. Commands other than `--version` probes are
/// recorded and succeed with empty output. When built with
/// [`VersionEchoExecutor::installing_packages_to`], `dpkg -i` and `rpm -U`
/// copy the package file to that path, standing in for a real package
/// manager.
#[derive(Debug, Default)]
pub struct VersionEchoExecutor {
    other_calls: RefCell<Vec<String>>,
    package_target: Option<PathBuf>,
}

impl VersionEchoExecutor {
    /// Create an executor whose package installs land at `target`.
    #[must_use]
    pub fn installing_packages_to(target: impl Into<PathBuf>) -> Self {
        Self {
            other_calls: RefCell::default(),
            package_target: Some(target.into()),
        }
    }

    /// Returns the non-probe commands that were run, space-joined.
    #[must_use]
    pub fn other_calls(&self) -> Vec<String> {
        self.other_calls.borrow().clone()
    }

    fn simulate_package_install(&self, cmd: &str, args: &[&str]) -> Result<()> {
        let Some(target) = &self.package_target else {
            return Ok(());
        };
        let argv: Vec<&str> = std::iter::once(cmd)
            .chain(args.iter().copied())
            .skip_while(|arg| *arg == "sudo")
            .collect();
        if let ["dpkg", "-i", package] | ["rpm", "-U", package] = argv.as_slice() {
            if let Some(dir) = target.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::copy(package, target)?;
            set_mode(target, 0o755)?;
        }
        Ok(())
    }
}

impl CommandExecutor for VersionEchoExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        if args == ["--version"] {
            let contents = std::fs::read_to_string(cmd)?;
            return Ok(stdout_output(&contents));
        }
        let mut line = cmd.to_owned();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.other_calls.borrow_mut().push(line);
        self.simulate_package_install(cmd, args)?;
        Ok(success_output())
    }
}

/// Set the Unix permission bits of `path`.
///
/// # Errors
///
/// Returns an I/O error if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

/// Write `contents` to `path` as an executable file, creating parent
/// directories.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
#[cfg(unix)]
pub fn write_executable(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)?;
    set_mode(path, 0o755)
}

/// An in-memory [`ArtefactDownloader`] serving a fixed feed and artefacts.
///
/// Counts artefact downloads so tests can assert idempotence.
#[derive(Debug, Default)]
pub struct StubDownloader {
    feed: RefCell<Option<std::result::Result<String, String>>>,
    artefacts: RefCell<HashMap<String, Vec<u8>>>,
    artefact_downloads: Cell<usize>,
    feed_downloads: Cell<usize>,
}

impl StubDownloader {
    /// Create a downloader that serves `feed` as the release feed body.
    #[must_use]
    pub fn with_feed(feed: impl Into<String>) -> Self {
        let downloader = Self::default();
        downloader.set_feed(feed);
        downloader
    }

    /// Replace the feed body.
    pub fn set_feed(&self, feed: impl Into<String>) {
        *self.feed.borrow_mut() = Some(Ok(feed.into()));
    }

    /// Make feed requests fail with an HTTP error.
    pub fn fail_feed(&self, reason: &str) {
        *self.feed.borrow_mut() = Some(Err(reason.to_owned()));
    }

    /// Serve `contents` for downloads of `url`.
    pub fn serve(&self, url: &str, contents: impl Into<Vec<u8>>) {
        self.artefacts
            .borrow_mut()
            .insert(url.to_owned(), contents.into());
    }

    /// Number of artefact downloads performed so far.
    #[must_use]
    pub fn artefact_downloads(&self) -> usize {
        self.artefact_downloads.get()
    }

    /// Number of feed downloads performed so far.
    #[must_use]
    pub fn feed_downloads(&self) -> usize {
        self.feed_downloads.get()
    }
}

impl ArtefactDownloader for StubDownloader {
    fn download_feed(&self, url: &str) -> std::result::Result<String, DownloadError> {
        self.feed_downloads.set(self.feed_downloads.get() + 1);
        match self.feed.borrow().clone() {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(DownloadError::HttpError {
                url: url.to_owned(),
                reason,
            }),
            None => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
        }
    }

    fn download_artefact(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError> {
        self.artefact_downloads
            .set(self.artefact_downloads.get() + 1);
        let artefacts = self.artefacts.borrow();
        let contents = artefacts.get(url).ok_or_else(|| DownloadError::NotFound {
            url: url.to_owned(),
        })?;
        std::fs::write(dest, contents)?;
        Ok(())
    }
}

/// One build entry for [`release_feed_json`]: `(arch, file, url)`.
pub type FeedBuild<'a> = (&'a str, &'a str, &'a str);

/// Build a release feed body with a single release.
///
/// # Examples
///
/// ```
/// use but_installer::test_utils::release_feed_json;
///
/// let json = release_feed_json(
///     "2.2.19",
///     &[("x86_64", "but", "https://releases.gitbutler.com/x/but")],
/// );
/// assert!(json.starts_with('['));
/// ```
#[must_use]
pub fn release_feed_json(version: &str, builds: &[FeedBuild<'_>]) -> String {
    let entries: Vec<serde_json::Value> = builds
        .iter()
        .map(|(arch, file, url)| {
            serde_json::json!({
                "os": "linux",
                "arch": arch,
                "file": file,
                "url": url,
                "platform": format!("linux-{arch}"),
            })
        })
        .collect();
    serde_json::json!([{ "version": version, "builds": entries }]).to_string()
}

/// Build a `.tar.gz` archive in memory containing `entries` of
/// `(path, contents)`.
///
/// # Panics
///
/// Panics if the archive cannot be assembled.
#[must_use]
pub fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *contents)
            .expect("append tar entry");
    }
    let encoder = builder.into_inner().expect("finish tar");
    encoder.finish().expect("finish gzip")
}
