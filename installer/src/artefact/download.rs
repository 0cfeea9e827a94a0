//! HTTP retrieval of the release feed and release artefacts.
//!
//! Provides a trait-based abstraction over the network so the resolver,
//! fetcher, and install flow can be exercised without network access.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout applied to every request, including the body transfer.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = concat!("but-installer/", env!("CARGO_PKG_VERSION"));

/// Trait for downloading the release feed and artefact files.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download the release feed at `url` and return the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server responds with a
    /// failure status.
    fn download_feed(&self, url: &str) -> Result<String, DownloadError>;

    /// Stream the artefact at `url` into the file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server responds with a
    /// failure status, or the file cannot be written.
    fn download_artefact(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
///
/// # Examples
///
/// ```no_run
/// use but_installer::artefact::download::{ArtefactDownloader, HttpDownloader};
///
/// let feed = HttpDownloader.download_feed("https://app.gitbutler.com/releases")?;
/// assert!(!feed.is_empty());
/// # Ok::<(), but_installer::artefact::download::DownloadError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDownloader;

impl ArtefactDownloader for HttpDownloader {
    fn download_feed(&self, url: &str) -> Result<String, DownloadError> {
        log::debug!("fetching release feed {url}");
        let response = http_agent()
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download_artefact(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        log::debug!("downloading {url} to {}", dest.display());
        let response = http_agent()
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        let mut body = response.into_body();
        let mut reader = body.as_reader();
        let copied = std::io::copy(&mut reader, &mut file).map_err(|e| DownloadError::HttpError {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        file.sync_all()?;
        log::trace!("wrote {copied} bytes to {}", dest.display());
        Ok(())
    }
}

/// Shared `ureq` agent with request timeout configuration.
///
/// Status codes of 400 and above are reported as errors, so a failed
/// download never produces a "successful" error-page file.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .http_status_as_error(true)
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(code) => DownloadError::HttpError {
            url: url.to_owned(),
            reason: format!("server responded with HTTP {code}"),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://releases.gitbutler.com/x/but", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[rstest]
    #[case(403)]
    #[case(500)]
    #[case(503)]
    fn map_ureq_error_maps_other_status_to_http_error(#[case] code: u16) {
        let err = ureq::Error::StatusCode(code);
        let mapped = map_ureq_error("https://releases.gitbutler.com/x/but", &err);
        match mapped {
            DownloadError::HttpError { reason, .. } => {
                assert!(reason.contains(&code.to_string()), "reason: {reason}");
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[test]
    fn not_found_display_includes_url() {
        let err = DownloadError::NotFound {
            url: "https://releases.gitbutler.com/x/but".to_owned(),
        };
        assert!(err.to_string().contains("releases.gitbutler.com"));
    }
}
