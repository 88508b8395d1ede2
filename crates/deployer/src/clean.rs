use std::path::Path;

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("failed to remove cache directory {path}: {source}")]
pub struct CleanError {
    path: String,
    #[source]
    source: std::io::Error,
}

/// Empties the artifacts cache by deleting and recreating `cache_dir`.
///
/// A missing cache directory is not an error. Failing to recreate the
/// directory is only logged, since the next download creates it again.
pub fn clean_cache(cache_dir: &Path) -> Result<(), CleanError> {
    match std::fs::remove_dir_all(cache_dir) {
        Ok(()) => info!(cache_dir = %cache_dir.display(), "Removed artifacts cache"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(CleanError {
                path: cache_dir.display().to_string(),
                source,
            });
        }
    }
    if let Err(err) = std::fs::create_dir_all(cache_dir) {
        warn!(cache_dir = %cache_dir.display(), %err, "Failed to recreate artifacts cache");
    }
    Ok(())
}
