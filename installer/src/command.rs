//! External command execution.
//!
//! The installer shells out for three things: probing the installed `but`
//! binary, detecting the host package manager, and handing packages to
//! `dpkg` or `rpm`. All of them go through [`CommandExecutor`] so tests can
//! substitute canned responses.

use crate::error::{InstallerError, Result};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for external commands (5 minutes).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, including a [`std::io::ErrorKind::TimedOut`] error when the
    /// command does not finish in time.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use but_installer::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("dpkg", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), but_installer::error::InstallerError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system, killing them after a timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Create an executor with a custom timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        log::debug!("running {cmd} {}", args.join(" "));
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // Both pipes are drained while waiting, otherwise a child that fills
        // a pipe buffer blocks forever and only the timeout ends it.
        thread::scope(|scope| -> Result<Output> {
            let stdout_reader = scope.spawn(move || drain(stdout_pipe));
            let stderr_reader = scope.spawn(move || drain(stderr_pipe));
            let status = self.wait_or_kill(&mut child, cmd);
            let stdout = join_reader(stdout_reader)?;
            let stderr = join_reader(stderr_reader)?;
            Ok(Output {
                status: status?,
                stdout,
                stderr,
            })
        })
    }
}

impl SystemCommandExecutor {
    fn wait_or_kill(&self, child: &mut Child, cmd: &str) -> Result<ExitStatus> {
        if let Some(status) = child.wait_timeout(self.timeout)? {
            return Ok(status);
        }
        // Best-effort cleanup; the timeout error below is what matters.
        if child.kill().is_err() {
            log::debug!("{cmd} exited before it could be killed");
        }
        child.wait()?;
        Err(InstallerError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{cmd} timed out after {} seconds", self.timeout.as_secs()),
        )))
    }
}

fn drain(pipe: Option<impl Read>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut reader) = pipe {
        reader.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

fn join_reader(handle: ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output reader thread panicked")))
}

/// Returns true if the given command executes successfully.
#[must_use]
pub fn command_succeeds(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> bool {
    executor.run(cmd, args).is_ok_and(|o| o.status.success())
}
