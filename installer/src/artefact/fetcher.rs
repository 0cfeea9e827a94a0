//! Download-and-stage pipeline for a selected build.
//!
//! The fetcher owns the staging lifecycle: a fresh [`StagingArea`] is
//! created per fetch and handed back inside [`FetchedArtefact`], so the
//! staged files live exactly as long as the caller needs them. Any error
//! drops the staging area before returning.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::download::ArtefactDownloader;
use super::extraction::{ArtefactExtractor, find_payload};
use super::staging::{StagingArea, StagingRegistry};
use crate::error::{InstallerError, Result};
use crate::release::feed::{BuildArtefact, FileKind};

const UNPACK_DIR: &str = "unpacked";

/// A downloaded artefact ready to install.
#[derive(Debug)]
pub struct FetchedArtefact {
    /// The file to install: the download itself, or the payload found
    /// inside an unpacked archive.
    pub payload: PathBuf,
    /// Lowercase hex SHA-256 of the downloaded file.
    pub sha256: String,
    /// Staging area holding `payload`; removed when dropped.
    pub staging: StagingArea,
}

/// Downloads builds into staging areas and unpacks archives.
pub struct ArtefactFetcher<'a> {
    downloader: &'a dyn ArtefactDownloader,
    extractor: &'a dyn ArtefactExtractor,
    registry: &'static StagingRegistry,
}

impl<'a> ArtefactFetcher<'a> {
    /// Create a fetcher tracking staging areas in `registry`.
    #[must_use]
    pub const fn with_registry(
        downloader: &'a dyn ArtefactDownloader,
        extractor: &'a dyn ArtefactExtractor,
        registry: &'static StagingRegistry,
    ) -> Self {
        Self {
            downloader,
            extractor,
            registry,
        }
    }

    /// Download `build` and locate the file to install.
    ///
    /// For archives, the payload is the first file whose name ends with
    /// `payload_suffix` at the top of the archive or one directory down.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Download`] if the transfer fails,
    /// [`InstallerError::EmptyArtefact`] for a zero-length download,
    /// [`InstallerError::Extraction`] if an archive cannot be unpacked, and
    /// [`InstallerError::PayloadNotFound`] if no payload matches.
    pub fn fetch(&self, build: &BuildArtefact, payload_suffix: &str) -> Result<FetchedArtefact> {
        let staging = StagingArea::with_registry(self.registry)?;
        let download_path = staging.path().join(staged_file_name(&build.filename));

        self.downloader
            .download_artefact(&build.url, &download_path)?;

        let size = fs::metadata(&download_path)?.len();
        if size == 0 {
            return Err(InstallerError::EmptyArtefact {
                path: download_path,
            });
        }
        log::debug!("downloaded {size} bytes from {}", build.url);

        let sha256 = sha256_hex(&download_path)?;

        let payload = match build.file_kind {
            FileKind::Archive(format) => {
                let unpack_dir = staging.path().join(UNPACK_DIR);
                fs::create_dir(&unpack_dir)?;
                self.extractor
                    .extract(format, &download_path, &unpack_dir)
                    .map_err(|source| InstallerError::Extraction {
                        archive: build.filename.clone(),
                        source,
                    })?;
                find_payload(&unpack_dir, payload_suffix)?.ok_or_else(|| {
                    InstallerError::PayloadNotFound {
                        suffix: payload_suffix.to_owned(),
                    }
                })?
            }
            FileKind::Deb | FileKind::Rpm | FileKind::Binary => download_path,
        };

        Ok(FetchedArtefact {
            payload,
            sha256,
            staging,
        })
    }
}

/// Reduce a feed-supplied file name to a single path component.
fn staged_file_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("artefact")
}

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn sha256_hex(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::download::{DownloadError, MockArtefactDownloader};
    use crate::artefact::extraction::{
        ArchiveExtractor, ArchiveFormat, ExtractionError, MockArtefactExtractor,
    };
    use crate::platform::Arch;
    use crate::test_utils::{StubDownloader, tar_gz_bytes};
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    const BINARY_URL: &str = "https://releases.gitbutler.com/x/but";
    const ARCHIVE_URL: &str = "https://releases.gitbutler.com/x/but.tar.gz";

    fn build(filename: &str, url: &str) -> BuildArtefact {
        BuildArtefact {
            arch: Arch::X86_64,
            os: None,
            file_kind: FileKind::from_filename(filename),
            url: url.to_owned(),
            filename: filename.to_owned(),
        }
    }

    #[test]
    fn binary_download_is_the_payload() {
        static REGISTRY: StagingRegistry = StagingRegistry::new();
        let downloader = StubDownloader::default();
        downloader.serve(BINARY_URL, "but 2.2.19\n");
        let mut extractor = MockArtefactExtractor::new();
        extractor.expect_extract().never();

        let fetched = ArtefactFetcher::with_registry(&downloader, &extractor, &REGISTRY)
            .fetch(&build("but", BINARY_URL), "but")
            .expect("fetch");

        assert_eq!(
            fs::read_to_string(&fetched.payload).expect("payload"),
            "but 2.2.19\n"
        );
        assert!(fetched.payload.starts_with(fetched.staging.path()));
        assert_eq!(fetched.sha256.len(), 64);
        assert!(REGISTRY.contains(fetched.staging.path()));
    }

    #[test]
    fn digest_matches_known_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").expect("write");
        assert_eq!(
            sha256_hex(&path).expect("digest"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn zero_byte_download_fails_and_cleans_up() {
        static REGISTRY: StagingRegistry = StagingRegistry::new();
        let seen = Arc::new(Mutex::new(None::<PathBuf>));
        let recorder = Arc::clone(&seen);
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download_artefact()
            .times(1)
            .returning(move |_, dest| {
                fs::write(dest, b"")?;
                *recorder.lock().expect("lock") = Some(dest.to_path_buf());
                Ok(())
            });
        let extractor = MockArtefactExtractor::new();

        let err = ArtefactFetcher::with_registry(&downloader, &extractor, &REGISTRY)
            .fetch(&build("but", BINARY_URL), "but")
            .expect_err("empty artefact");

        assert!(matches!(err, InstallerError::EmptyArtefact { .. }), "got {err:?}");
        let dest = seen.lock().expect("lock").clone().expect("download attempted");
        assert!(!dest.exists());
        assert!(dest.parent().is_some_and(|staging| !staging.exists()));
        assert!(REGISTRY.is_empty());
    }

    #[test]
    fn transport_failure_is_download_error() {
        static REGISTRY: StagingRegistry = StagingRegistry::new();
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download_artefact()
            .returning(|url, _| {
                Err(DownloadError::HttpError {
                    url: url.to_owned(),
                    reason: "server responded with HTTP 503".to_owned(),
                })
            });
        let extractor = MockArtefactExtractor::new();

        let err = ArtefactFetcher::with_registry(&downloader, &extractor, &REGISTRY)
            .fetch(&build("but", BINARY_URL), "but")
            .expect_err("download failure");

        assert!(matches!(err, InstallerError::Download(_)), "got {err:?}");
        assert!(REGISTRY.is_empty());
    }

    #[rstest]
    #[case::top_level(&[("but", b"but 2.2.19\n" as &[u8])])]
    #[case::nested(&[("gitbutler-2.2.19/README", b"docs" as &[u8]), ("gitbutler-2.2.19/but", b"but 2.2.19\n" as &[u8])])]
    fn archive_payload_is_located(#[case] entries: &[(&str, &[u8])]) {
        static REGISTRY: StagingRegistry = StagingRegistry::new();
        let downloader = StubDownloader::default();
        downloader.serve(ARCHIVE_URL, tar_gz_bytes(entries));

        let fetched = ArtefactFetcher::with_registry(&downloader, &ArchiveExtractor, &REGISTRY)
            .fetch(&build("but.tar.gz", ARCHIVE_URL), "but")
            .expect("fetch");

        assert_eq!(
            fs::read_to_string(&fetched.payload).expect("payload"),
            "but 2.2.19\n"
        );
    }

    #[test]
    fn archive_without_payload_fails() {
        static REGISTRY: StagingRegistry = StagingRegistry::new();
        let downloader = StubDownloader::default();
        downloader.serve(ARCHIVE_URL, tar_gz_bytes(&[("README", b"docs")]));

        let err = ArtefactFetcher::with_registry(&downloader, &ArchiveExtractor, &REGISTRY)
            .fetch(&build("but.tar.gz", ARCHIVE_URL), ".AppImage")
            .expect_err("payload missing");

        assert!(
            matches!(err, InstallerError::PayloadNotFound { ref suffix } if suffix == ".AppImage"),
            "got {err:?}"
        );
        assert!(REGISTRY.is_empty());
    }

    #[test]
    fn extraction_failure_names_the_archive() {
        static REGISTRY: StagingRegistry = StagingRegistry::new();
        let downloader = StubDownloader::default();
        downloader.serve(ARCHIVE_URL, "not really gzip");
        let mut extractor = MockArtefactExtractor::new();
        extractor
            .expect_extract()
            .withf(|format, _, _| *format == ArchiveFormat::TarGz)
            .times(1)
            .returning(|_, _, _| Err(ExtractionError::EmptyArchive));

        let err = ArtefactFetcher::with_registry(&downloader, &extractor, &REGISTRY)
            .fetch(&build("but.tar.gz", ARCHIVE_URL), "but")
            .expect_err("extraction failure");

        assert!(
            matches!(err, InstallerError::Extraction { ref archive, .. } if archive == "but.tar.gz"),
            "got {err:?}"
        );
    }

    #[rstest]
    #[case("but_2.2.19_amd64.deb", "but_2.2.19_amd64.deb")]
    #[case("../../etc/passwd", "passwd")]
    #[case("", "artefact")]
    fn staged_names_are_single_components(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(staged_file_name(filename), expected);
    }
}
