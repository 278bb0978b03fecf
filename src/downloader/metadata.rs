//! Station metadata sidecar
//!
//! The metadata endpoint serves one CSV wrapped in a single-entry ZIP
//! archive. This module fetches the archive, extracts the CSV and writes it
//! to `metadata.csv` under the destination root, with the same skip and
//! temp-file rules as observation files.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::downloader::config::calculate_backoff;
use crate::downloader::engine::is_populated;
use crate::downloader::DownloadError;
use crate::fetcher::http::METADATA_URL;
use crate::fetcher::{AirQualityApi, FetcherResult};
use crate::metrics;
use crate::output::path::temp_path;

/// File name of the sidecar under the destination root
pub const METADATA_FILENAME: &str = "metadata.csv";

/// Result of a metadata fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataOutcome {
    /// Sidecar was fetched, extracted and moved into place
    Downloaded {
        /// Size of the extracted CSV
        bytes: u64,
    },
    /// Destination already held a non-empty sidecar, nothing fetched
    Skipped,
}

/// Download the station metadata CSV into `dest_root`
pub async fn fetch_metadata(
    api: &Arc<dyn AirQualityApi>,
    dest_root: &Path,
    overwrite: bool,
    max_attempts: u32,
) -> Result<MetadataOutcome, DownloadError> {
    let final_path = dest_root.join(METADATA_FILENAME);

    if !overwrite && is_populated(&final_path) {
        debug!(path = %final_path.display(), "Metadata already present, skipping");
        return Ok(MetadataOutcome::Skipped);
    }

    tokio::fs::create_dir_all(dest_root).await.map_err(|e| {
        DownloadError::IoError(format!("failed to create {}: {e}", dest_root.display()))
    })?;

    info!(url = METADATA_URL, "Fetching station metadata");
    let archive = fetch_archive(api, max_attempts).await?;
    let csv = extract_csv(&archive)?;

    let temp = temp_path(&final_path);
    if let Err(e) = tokio::fs::write(&temp, &csv).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(DownloadError::IoError(format!(
            "failed to write {}: {e}",
            temp.display()
        )));
    }
    if let Err(e) = tokio::fs::rename(&temp, &final_path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(DownloadError::IoError(format!(
            "failed to move {} into place: {e}",
            temp.display()
        )));
    }

    info!(
        path = %final_path.display(),
        bytes = csv.len(),
        "Station metadata written"
    );
    Ok(MetadataOutcome::Downloaded {
        bytes: csv.len() as u64,
    })
}

/// Fetch the raw archive body with retry
async fn fetch_archive(
    api: &Arc<dyn AirQualityApi>,
    max_attempts: u32,
) -> Result<Vec<u8>, DownloadError> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            let backoff = calculate_backoff(attempt - 1);
            warn!(
                attempt = attempt + 1,
                max_attempts,
                backoff_ms = backoff.as_millis(),
                "Retrying metadata fetch after backoff delay"
            );
            metrics::record_retry_backoff(backoff, attempt);
            tokio::time::sleep(backoff).await;
        }

        match read_body(api).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                debug!(attempt = attempt + 1, error = %e, "Metadata fetch attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(DownloadError::NetworkError(format!(
        "metadata fetch failed after {max_attempts} attempt(s): {}",
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string())
    )))
}

async fn read_body(api: &Arc<dyn AirQualityApi>) -> FetcherResult<Vec<u8>> {
    let mut stream = api.stream_file(METADATA_URL).await?;
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
    }
    Ok(body)
}

/// Pull the CSV out of the single-entry ZIP archive
fn extract_csv(archive: &[u8]) -> Result<Vec<u8>, DownloadError> {
    let cursor = Cursor::new(archive);
    let mut zip = ZipArchive::new(cursor)
        .map_err(|e| DownloadError::ArchiveError(format!("invalid metadata archive: {e}")))?;

    if zip.len() != 1 {
        return Err(DownloadError::ArchiveError(format!(
            "expected a single file in the metadata archive, found {}",
            zip.len()
        )));
    }

    let mut entry = zip
        .by_index(0)
        .map_err(|e| DownloadError::ArchiveError(format!("unreadable archive entry: {e}")))?;
    let mut csv = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut csv)
        .map_err(|e| DownloadError::ArchiveError(format!("failed to extract metadata: {e}")))?;
    Ok(csv)
}
