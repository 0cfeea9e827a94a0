//! Ephemeral staging directories for downloads.
//!
//! A [`StagingArea`] owns a uniquely named temporary directory. Dropping it
//! removes the directory, which covers normal returns and `?` propagation.
//! Interrupts bypass destructors, so every live staging directory is also
//! recorded in a [`StagingRegistry`] that the SIGINT/SIGTERM handler purges
//! before exiting. Temporary files written next to the install target are
//! tracked the same way through [`StagingRegistry::track`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;

/// Exit status used when the installer is interrupted.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Process-wide registry consulted by the interrupt handler.
pub static STAGING_REGISTRY: StagingRegistry = StagingRegistry::new();

/// Tracks staging directories and temporary files that are currently alive.
#[derive(Debug)]
pub struct StagingRegistry {
    paths: Mutex<Vec<PathBuf>>,
}

impl StagingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            paths: Mutex::new(Vec::new()),
        }
    }

    /// Returns true if `path` is currently registered.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().iter().any(|registered| registered == path)
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Register `path` until the returned guard is dropped.
    ///
    /// Used for temporary files created outside a [`StagingArea`], such as
    /// a half-copied binary beside the install target.
    #[must_use]
    pub fn track(&'static self, path: &Path) -> TrackedPath {
        self.register(path);
        TrackedPath {
            path: path.to_path_buf(),
            registry: self,
        }
    }

    /// Remove every registered directory or file from disk and forget it.
    ///
    /// Returns the number of paths removed. Removal failures are logged and
    /// skipped so one stubborn path cannot block the rest.
    #[must_use]
    pub fn purge(&self) -> usize {
        let drained: Vec<PathBuf> = self.lock().drain(..).collect();
        let mut removed = 0;
        for path in drained {
            let result = match path.symlink_metadata() {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
                Ok(_) => std::fs::remove_file(&path),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("could not remove {}: {e}", path.display()),
            }
        }
        removed
    }

    fn register(&self, path: &Path) {
        self.lock().push(path.to_path_buf());
    }

    fn unregister(&self, path: &Path) {
        self.lock().retain(|registered| registered != path);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StagingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration of a single path; unregisters it when dropped.
#[derive(Debug)]
pub struct TrackedPath {
    path: PathBuf,
    registry: &'static StagingRegistry,
}

impl Drop for TrackedPath {
    fn drop(&mut self) {
        self.registry.unregister(&self.path);
    }
}

/// An exclusively owned temporary directory for one download.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    registry: &'static StagingRegistry,
}

impl StagingArea {
    /// Create a staging area in the system temporary directory, tracked by
    /// `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_registry(registry: &'static StagingRegistry) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("but-installer-")
            .tempdir()?;
        registry.register(dir.path());
        log::debug!("created staging area {}", dir.path().display());
        Ok(Self { dir, registry })
    }

    /// Path of the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.registry.unregister(self.dir.path());
        log::debug!("removing staging area {}", self.dir.path().display());
    }
}

/// Install a SIGINT/SIGTERM handler that purges the staging registry and
/// exits with [`INTERRUPTED_EXIT_CODE`].
///
/// # Errors
///
/// Returns an error if a handler is already installed or the platform
/// rejects the registration.
pub fn install_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        let removed = STAGING_REGISTRY.purge();
        log::debug!("interrupted; removed {removed} staged path(s)");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
}
