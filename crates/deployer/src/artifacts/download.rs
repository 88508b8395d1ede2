use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use sha2::{Digest, Sha256};
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::{
    ArtifactsError, ArtifactsFs, DownloadProgressor, IntegrityChecker, TarballExtractor, io_err,
};

const TEMP_PREFIX: &str = "op-deployer-artifacts-";
const FORGE_ARTIFACTS_DIR: &str = "forge-artifacts";

/// Downloads artifact archives into a URL-keyed cache and unpacks them.
///
/// Every call to [`CachingDownloader::resolve`] holds the downloader's lock
/// for the whole download and extraction.
pub struct CachingDownloader {
    http: reqwest::Client,
    lock: Mutex<()>,
}

impl Default for CachingDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl CachingDownloader {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the cached archive for `url`.
    pub fn cache_path(cache_dir: &Path, url: &Url) -> PathBuf {
        let key = hex::encode(Sha256::digest(url.as_str().as_bytes()));
        cache_dir.join(format!("{key}.tgz"))
    }

    pub async fn resolve(
        &self,
        url: &Url,
        checker: IntegrityChecker,
        progressor: DownloadProgressor,
        cache_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ArtifactsFs, ArtifactsError> {
        let _guard = self.lock.lock().await;

        let tarball = self.download(url, progressor, cache_dir, cancel).await?;
        let extract_dir = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir()
            .map_err(io_err("failed to create temp dir"))?;
        let dest = extract_dir.path().to_path_buf();

        tokio::task::spawn_blocking(move || TarballExtractor::new(checker).extract(&tarball, &dest))
            .await
            .map_err(|e| ArtifactsError::Task(e.to_string()))??;

        let root = extract_dir.path().join(FORGE_ARTIFACTS_DIR);
        Ok(ArtifactsFs::extracted(root, Arc::new(extract_dir)))
    }

    /// Returns the cached archive for `url`, fetching it first on a miss.
    async fn download(
        &self,
        url: &Url,
        progressor: DownloadProgressor,
        cache_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ArtifactsError> {
        let cache_path = Self::cache_path(cache_dir, url);
        if matches!(tokio::fs::try_exists(&cache_path).await, Ok(true)) {
            debug!(path = %cache_path.display(), "using cached artifacts");
            return Ok(cache_path);
        }

        info!(%url, "downloading artifacts");
        let mut response = tokio::select! {
            response = self.http.get(url.clone()).send() => {
                response.map_err(|e| ArtifactsError::Http { url: url.to_string(), cause: e.to_string() })?
            }
            _ = cancel.cancelled() => return Err(ArtifactsError::Cancelled),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactsError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tokio::fs::create_dir_all(cache_dir)
            .await
            .map_err(io_err("failed to ensure cache directory"))?;
        let tmp_dir = cache_dir.to_path_buf();
        let (file, tmp_path) = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(tmp_dir)
        })
        .await
        .map_err(|e| ArtifactsError::Task(e.to_string()))?
        .map_err(io_err("failed to create temporary file"))?
        .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let total = response.content_length();
        let mut current = 0u64;
        loop {
            let chunk = tokio::select! {
                chunk = response.chunk() => {
                    chunk.map_err(|e| ArtifactsError::Http { url: url.to_string(), cause: e.to_string() })?
                }
                _ = cancel.cancelled() => return Err(ArtifactsError::Cancelled),
            };
            let Some(chunk) = chunk else {
                break;
            };
            file.write_all(&chunk)
                .await
                .map_err(io_err("failed to write to temporary file"))?;
            current += chunk.len() as u64;
            progressor(current, total);
        }
        file.flush()
            .await
            .map_err(io_err("failed to write to temporary file"))?;
        drop(file);

        let dest = cache_path.clone();
        tokio::task::spawn_blocking(move || tmp_path.persist(dest))
            .await
            .map_err(|e| ArtifactsError::Task(e.to_string()))?
            .map_err(|e| io_err("failed to move downloaded file to cache")(e.error))?;
        Ok(cache_path)
    }
}
