//! Removal of an installed `but`.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use super::{InstallManager, Outcome, State};
use crate::error::{InstallerError, Result};

/// Asks the user to approve a destructive action.
#[cfg_attr(test, mockall::automock)]
pub trait Confirmer {
    /// Show `prompt` and return true only on an explicit yes.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Prompts on stderr and reads the answer from stdin.
///
/// Declines without prompting when stdin is not a terminal, so piped and
/// scripted runs never uninstall without `--force`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            log::debug!("stdin is not a terminal; declining confirmation");
            return false;
        }
        let mut stderr = io::stderr();
        if write!(stderr, "{prompt} [y/N] ").is_err() || stderr.flush().is_err() {
            return false;
        }
        read_answer(&mut stdin.lock())
    }
}

/// Read one line and return true for `y` or `yes`, case-insensitively.
#[must_use]
pub fn read_answer(reader: &mut dyn BufRead) -> bool {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Removal {
    File(PathBuf),
    Dir(PathBuf),
}

impl Removal {
    fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Dir(path) => path,
        }
    }
}

impl InstallManager<'_> {
    /// Remove the installed binary or symlink and the application
    /// directory.
    ///
    /// Asks `confirmer` first unless `force` is set. Finding nothing to
    /// remove is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Permission`] when a path cannot be removed
    /// for lack of privileges, and [`InstallerError::Io`] for other
    /// filesystem failures.
    pub fn uninstall(
        &self,
        force: bool,
        confirmer: &dyn Confirmer,
        stderr: &mut dyn Write,
    ) -> Result<Outcome> {
        log::debug!("state {:?}", State::Uninstalling);
        let state = self.probe();
        let app_dir = self.config.app_dir.as_std_path();

        let mut removals = Vec::new();
        if state.target_exists() {
            removals.push(Removal::File(state.target_path.clone()));
        }
        if app_dir.symlink_metadata().is_ok() {
            removals.push(Removal::Dir(app_dir.to_path_buf()));
        }

        if removals.is_empty() {
            if let Some(elsewhere) = &state.located_at {
                self.reporter.info(
                    stderr,
                    format_args!(
                        "Found but at {}, which this installer does not manage.",
                        elsewhere.display()
                    ),
                );
            }
            return Ok(Outcome::NothingToUninstall);
        }

        if !force {
            let listed: Vec<String> = removals
                .iter()
                .map(|removal| removal.path().display().to_string())
                .collect();
            let prompt = format!("Remove {}?", listed.join(" and "));
            if !confirmer.confirm(&prompt) {
                return Ok(Outcome::Cancelled);
            }
        }

        let mut removed = Vec::with_capacity(removals.len());
        for removal in removals {
            remove(&removal)?;
            self.reporter
                .info(stderr, format_args!("Removed {}", removal.path().display()));
            removed.push(removal.path().to_path_buf());
        }
        Ok(Outcome::Uninstalled { removed })
    }
}

fn remove(removal: &Removal) -> Result<()> {
    let result = match removal {
        Removal::File(path) => fs::remove_file(path),
        Removal::Dir(path) => fs::remove_dir_all(path),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallerError::from_fs("removing", removal.path(), e)),
    }
}
