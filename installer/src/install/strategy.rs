//! Filesystem swap strategies, one per artefact file kind.
//!
//! Every strategy leaves the previous installation untouched until the new
//! one is complete: binaries and payloads are written to a temporary file in
//! the destination directory and renamed into place, and the archive
//! symlink is created under a temporary name and renamed over the old link.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::artefact::staging::StagingRegistry;
use crate::command::CommandExecutor;
use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::release::feed::FileKind;

/// Mode applied to installed executables.
const EXECUTABLE_MODE: u32 = 0o755;

/// Prefix for temporary names created next to the final path.
const TEMP_PREFIX: &str = ".but-installer-";

/// Shared inputs for a swap.
pub struct StrategyContext<'a> {
    /// Installer settings.
    pub config: &'a InstallerConfig,
    /// Runs package managers.
    pub executor: &'a dyn CommandExecutor,
    /// Tracks temporary files so an interrupt can remove them.
    pub registry: &'static StagingRegistry,
}

/// Moves a staged payload into its installed location.
pub trait InstallStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Install `payload` and return the path a user would run.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Permission`] when the destination is not
    /// writable, [`InstallerError::PackageManager`] when a package manager
    /// rejects the package, and [`InstallerError::Io`] otherwise.
    fn install(&self, payload: &Path, ctx: &StrategyContext<'_>) -> Result<PathBuf>;
}

/// Choose the strategy for an artefact file kind.
#[must_use]
pub fn strategy_for(kind: FileKind) -> Box<dyn InstallStrategy> {
    match kind {
        FileKind::Deb => Box::new(PackageManagerStrategy::Dpkg),
        FileKind::Rpm => Box::new(PackageManagerStrategy::Rpm),
        FileKind::Binary => Box::new(BinaryStrategy),
        FileKind::Archive(_) => Box::new(ArchiveStrategy),
    }
}

/// Hands a native package to the platform package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerStrategy {
    /// `dpkg -i`.
    Dpkg,
    /// `rpm -U`.
    Rpm,
}

impl PackageManagerStrategy {
    const fn command(self) -> (&'static str, &'static str) {
        match self {
            Self::Dpkg => ("dpkg", "-i"),
            Self::Rpm => ("rpm", "-U"),
        }
    }
}

impl InstallStrategy for PackageManagerStrategy {
    fn name(&self) -> &'static str {
        self.command().0
    }

    fn install(&self, payload: &Path, ctx: &StrategyContext<'_>) -> Result<PathBuf> {
        let (manager, flag) = self.command();
        let package = payload.to_str().ok_or_else(|| InstallerError::PackageManager {
            manager,
            package: payload.to_path_buf(),
            message: "package path is not valid UTF-8".to_owned(),
        })?;

        let output = if ctx.config.use_sudo {
            ctx.executor.run("sudo", &[manager, flag, package])?
        } else {
            ctx.executor.run(manager, &[flag, package])?
        };

        if !output.status.success() {
            return Err(InstallerError::PackageManager {
                manager,
                package: payload.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(ctx.config.target_path().into_std_path_buf())
    }
}

/// Copies a single-file binary over the target path.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryStrategy;

impl InstallStrategy for BinaryStrategy {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn install(&self, payload: &Path, ctx: &StrategyContext<'_>) -> Result<PathBuf> {
        let target = ctx.config.target_path().into_std_path_buf();
        ensure_dir(ctx.config.bin_dir.as_std_path())?;
        replace_file(payload, &target, ctx.registry)?;
        Ok(target)
    }
}

/// Places an archive payload under the application directory and links
/// the target path to it.
///
/// Payload names carry the release version, so once the link points at the
/// new payload the one it replaced is deleted from the application directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveStrategy;

impl InstallStrategy for ArchiveStrategy {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn install(&self, payload: &Path, ctx: &StrategyContext<'_>) -> Result<PathBuf> {
        let app_dir = ctx.config.app_dir.as_std_path();
        let file_name = payload.file_name().ok_or_else(|| {
            InstallerError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("payload {} has no file name", payload.display()),
            ))
        })?;
        let installed = app_dir.join(file_name);
        let target = ctx.config.target_path().into_std_path_buf();

        ensure_dir(app_dir)?;
        replace_file(payload, &installed, ctx.registry)?;
        ensure_dir(ctx.config.bin_dir.as_std_path())?;
        let previous = fs::read_link(&target).ok();
        replace_symlink(&installed, &target, ctx.registry)?;
        if let Some(previous) = previous {
            remove_superseded(&previous, &installed, app_dir);
        }
        Ok(target)
    }
}

/// Delete the payload the link used to point at when it lives in `app_dir`
/// and is not the one just installed.
///
/// The new install is already live, so failures are logged rather than
/// returned.
fn remove_superseded(previous: &Path, installed: &Path, app_dir: &Path) {
    if previous == installed || previous.parent() != Some(app_dir) {
        return;
    }
    match fs::remove_file(previous) {
        Ok(()) => log::info!("removed superseded payload {}", previous.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "could not remove superseded payload {}: {e}",
            previous.display()
        ),
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| InstallerError::from_fs("creating", dir, e))
}

/// Copy `source` to a temporary file beside `dest`, mark it executable,
/// and rename it over `dest`.
///
/// The temporary file is registered with `registry` until the rename, so
/// an interrupt mid-copy does not leave a partial binary behind.
fn replace_file(source: &Path, dest: &Path, registry: &'static StagingRegistry) -> Result<()> {
    let dir = parent_of(dest)?;
    let mut staged = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| InstallerError::from_fs("writing to", dir, e))?;
    let _tracked = registry.track(staged.path());

    let mut reader = fs::File::open(source)?;
    io::copy(&mut reader, staged.as_file_mut())?;
    set_executable(staged.path())?;
    staged.as_file().sync_all()?;

    staged
        .persist(dest)
        .map_err(|e| InstallerError::from_fs("replacing", dest, e.error))?;
    log::debug!("installed {} -> {}", source.display(), dest.display());
    Ok(())
}

/// Point `link` at `original`, replacing whatever `link` was.
fn replace_symlink(
    original: &Path,
    link: &Path,
    registry: &'static StagingRegistry,
) -> Result<()> {
    let dir = parent_of(link)?;
    let staged = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .make_in(dir, |path| symlink(original, path))
        .map_err(|e| InstallerError::from_fs("linking in", dir, e))?;
    let _tracked = registry.track(staged.path());
    staged
        .persist(link)
        .map_err(|e| InstallerError::from_fs("replacing", link, e.error))?;
    log::debug!("linked {} -> {}", link.display(), original.display());
    Ok(())
}

fn parent_of(path: &Path) -> Result<&Path> {
    path.parent().ok_or_else(|| {
        InstallerError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        ))
    })
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinked installs require a Unix host",
    ))
}
