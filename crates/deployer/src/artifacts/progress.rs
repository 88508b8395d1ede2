use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tracing::info;

/// Called after every received chunk with the bytes downloaded so far and the
/// expected total, when the server announced one.
pub type DownloadProgressor = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Bytes between two log lines when the total size is unknown.
const UNKNOWN_TOTAL_LOG_INTERVAL: u64 = 16 * 1024 * 1024;

pub fn noop_progressor() -> DownloadProgressor {
    Arc::new(|_, _| {})
}

/// Logs progress in 10% steps, or every 16 MiB when the total is unknown.
pub fn log_progressor() -> DownloadProgressor {
    let last_bucket = AtomicU64::new(u64::MAX);
    Arc::new(move |current, total| {
        let bucket = match total {
            Some(total) if total > 0 => current.saturating_mul(10) / total,
            _ => current / UNKNOWN_TOTAL_LOG_INTERVAL,
        };
        if last_bucket.swap(bucket, Ordering::Relaxed) != bucket {
            info!(current, total = ?total, "artifacts download progress");
        }
    })
}
