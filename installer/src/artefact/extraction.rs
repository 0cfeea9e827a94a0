//! Archive extraction for bundled release artefacts.
//!
//! Unpacks `.tar.gz`, `.tar.zst`, and `.zip` archives into the staging area
//! with path traversal protection to prevent zip-slip attacks, then locates
//! the payload file inside the unpacked tree.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Compression formats accepted for bundled artefacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball (`.tar.gz` or `.tgz`).
    TarGz,
    /// Zstandard-compressed tarball (`.tar.zst`).
    TarZst,
    /// Zip archive (`.zip`).
    Zip,
}

impl ArchiveFormat {
    /// Detect the archive format from a file name.
    ///
    /// # Examples
    ///
    /// ```
    /// use but_installer::artefact::extraction::ArchiveFormat;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::from_filename("GitButler_0.14.0_amd64.AppImage.tar.gz"),
    ///     Some(ArchiveFormat::TarGz)
    /// );
    /// assert_eq!(ArchiveFormat::from_filename("but"), None);
    /// ```
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::Zip => "zip",
        };
        f.write_str(label)
    }
}

/// Trait for extracting artefact archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the names of the regular files that were extracted.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::LinkEntry`] for
    /// symbolic or hard links, [`ExtractionError::EmptyArchive`]
    /// if no files are found, and [`ExtractionError::Io`] or
    /// [`ExtractionError::Zip`] on read failures.
    fn extract(
        &self,
        format: ArchiveFormat,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains a symbolic or hard link.
    #[error("archive entry {path} is a link; links are not unpacked")]
    LinkEntry {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,
}

/// Default extractor backed by `tar`, `flate2`, `zstd`, and `zip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

impl ArtefactExtractor for ArchiveExtractor {
    fn extract(
        &self,
        format: ArchiveFormat,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError> {
        let file = fs::File::open(archive_path)?;
        let extracted = match format {
            ArchiveFormat::TarGz => unpack_tar(flate2::read::GzDecoder::new(file), dest_dir)?,
            ArchiveFormat::TarZst => unpack_tar(zstd::Decoder::new(file)?, dest_dir)?,
            ArchiveFormat::Zip => unpack_zip(file, dest_dir)?,
        };

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }
        log::debug!(
            "extracted {} file(s) from {}",
            extracted.len(),
            archive_path.display()
        );
        Ok(extracted)
    }
}

fn unpack_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            return Err(ExtractionError::LinkEntry {
                path: entry_path.display().to_string(),
            });
        }

        // `unpack_in` refuses to write through anything that resolves
        // outside `dest_dir`.
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractionError::PathTraversal {
                path: entry_path.display().to_string(),
            });
        }

        if !entry_type.is_file() {
            continue;
        }
        if let Some(name) = entry_path.file_name() {
            extracted.push(name.to_string_lossy().into_owned());
        }
    }

    Ok(extracted)
}

fn unpack_zip(file: fs::File, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(entry_path) = entry.enclosed_name() else {
            return Err(ExtractionError::PathTraversal {
                path: entry.name().to_owned(),
            });
        };
        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(&dest_path)?;
        std::io::copy(&mut entry, &mut out)?;

        apply_unix_mode(&dest_path, entry.unix_mode())?;

        if let Some(name) = entry_path.file_name() {
            extracted.push(name.to_string_lossy().into_owned());
        }
    }

    Ok(extracted)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(bits) => fs::set_permissions(path, fs::Permissions::from_mode(bits)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Validate that an archive entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Locate the payload in an unpacked archive.
///
/// Looks for a regular file whose name ends with `suffix`, first directly
/// inside `root`, then one directory level down. Deeper files are ignored.
/// Candidates are visited in name order so the choice is deterministic.
///
/// # Errors
///
/// Returns an I/O error if a directory cannot be read.
pub fn find_payload(root: &Path, suffix: &str) -> std::io::Result<Option<PathBuf>> {
    let top_level = sorted_entries(root)?;

    if let Some(found) = top_level
        .iter()
        .find(|path| is_payload(path, suffix))
    {
        return Ok(Some(found.clone()));
    }

    for dir in top_level
        .iter()
        .filter(|path| path.symlink_metadata().is_ok_and(|meta| meta.is_dir()))
    {
        if let Some(found) = sorted_entries(dir)?
            .into_iter()
            .find(|path| is_payload(path, suffix))
        {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Only regular files count; a symlink could point outside the archive.
fn is_payload(path: &Path, suffix: &str) -> bool {
    path.symlink_metadata().is_ok_and(|meta| meta.is_file())
        && path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(suffix))
}
