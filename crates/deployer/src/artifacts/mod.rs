//! Resolution of contract artifacts from a [`Locator`] to a local file tree.

mod download;
mod extract;
mod integrity;
mod locator;
mod progress;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ethereum_types::H256;
use lazy_static::lazy_static;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::standard;

pub use download::CachingDownloader;
pub use extract::TarballExtractor;
pub use integrity::IntegrityChecker;
pub use locator::{Locator, LocatorError};
pub use progress::{DownloadProgressor, log_progressor, noop_progressor};

lazy_static! {
    /// Shared by every resolve in the process.
    static ref DOWNLOADER: CachingDownloader = CachingDownloader::new();
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactsError {
    #[error("unsupported artifacts URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid file URL: {0}")]
    InvalidFileUrl(String),
    #[error("failed to resolve tag: {0}")]
    Tag(#[from] standard::StandardError),
    #[error("integrity check failed: hash mismatch: expected {expected:#x}, got {actual:#x}")]
    IntegrityCheckFailed { expected: H256, actual: H256 },
    #[error("failed to download artifacts from {url}: {cause}")]
    Http { url: String, cause: String },
    #[error("failed to download artifacts from {url}: invalid status code {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("invalid file path in archive: {0}")]
    InvalidEntryPath(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("extraction task failed: {0}")]
    Task(String),
    #[error("artifacts download cancelled")]
    Cancelled,
}

pub(crate) fn io_err(context: &'static str) -> impl Fn(std::io::Error) -> ArtifactsError {
    move |source| ArtifactsError::Io { context, source }
}

/// Root of a resolved artifacts tree.
///
/// Handles backed by an extracted archive keep the extraction directory alive
/// until the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ArtifactsFs {
    root: PathBuf,
    _extracted: Option<Arc<TempDir>>,
}

impl ArtifactsFs {
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _extracted: None,
        }
    }

    fn extracted(root: PathBuf, dir: Arc<TempDir>) -> Self {
        Self {
            root,
            _extracted: Some(dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Resolves `locator` through the process-wide [`CachingDownloader`].
///
/// Tags are fetched from the release registry and verified against the
/// registered hash; `file://` locators are used in place.
pub async fn download(
    locator: &Locator,
    progressor: Option<DownloadProgressor>,
    cache_dir: &Path,
    cancel: &CancellationToken,
) -> Result<ArtifactsFs, ArtifactsError> {
    download_with(&DOWNLOADER, locator, progressor, cache_dir, cancel).await
}

pub async fn download_with(
    downloader: &CachingDownloader,
    locator: &Locator,
    progressor: Option<DownloadProgressor>,
    cache_dir: &Path,
    cancel: &CancellationToken,
) -> Result<ArtifactsFs, ArtifactsError> {
    let progressor = progressor.unwrap_or_else(noop_progressor);

    let (url, checker) = match locator {
        Locator::Tag(tag) => (
            standard::artifacts_url_for_tag(tag)?,
            IntegrityChecker::Hash(standard::artifacts_hash_for_tag(tag)?),
        ),
        Locator::Url(url) => (url.clone(), IntegrityChecker::Noop),
    };

    match url.scheme() {
        "http" | "https" => {
            downloader
                .resolve(&url, checker, progressor, cache_dir, cancel)
                .await
        }
        "file" => url
            .to_file_path()
            .map(ArtifactsFs::from_dir)
            .map_err(|_| ArtifactsError::InvalidFileUrl(url.to_string())),
        other => Err(ArtifactsError::UnsupportedScheme(other.to_string())),
    }
}
