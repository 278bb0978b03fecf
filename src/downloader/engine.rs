//! Download engine with bounded concurrency and per-file retry

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::downloader::config::{calculate_backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONCURRENCY};
use crate::downloader::progress::{ProgressEvent, ProgressSink, RunTotals};
use crate::downloader::transfer::{DownloadSummary, FileOutcome, FileState};
use crate::downloader::DownloadError;
use crate::fetcher::AirQualityApi;
use crate::metrics;
use crate::output::path::temp_path;
use crate::resolver::FileRef;
use crate::shutdown::{self, SharedShutdown};

/// Why a single attempt ended
///
/// Transport faults are retried with backoff; filesystem faults fail the
/// file immediately since retrying cannot fix a full disk or a bad path.
enum AttemptError {
    Transport(String),
    Filesystem(String),
}

/// Downloads resolved files into a destination tree
///
/// Transfers run through a bounded pool; each file is streamed to a `.part`
/// temp file in its destination directory and moved into place only once the
/// body completed, so the final path never holds a partial file.
pub struct DownloadEngine {
    api: Arc<dyn AirQualityApi>,
    overwrite: bool,
    max_concurrency: usize,
    max_attempts: u32,
    progress: Option<Arc<dyn ProgressSink>>,
    shutdown: Option<SharedShutdown>,
}

impl DownloadEngine {
    /// Create an engine with default settings
    pub fn new(api: Arc<dyn AirQualityApi>) -> Self {
        Self {
            api,
            overwrite: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress: None,
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Re-download files whose destination is already populated
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the maximum number of transfers in flight at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Set attempts per file (first try included)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Attach a sink that receives one event per terminal outcome
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Download every file into `dest_root`
    ///
    /// Individual failures do not abort the run; they are counted and
    /// detailed in the returned summary. The engine itself only errors
    /// when the destination root cannot be created.
    pub async fn run(
        &self,
        files: Vec<FileRef>,
        dest_root: PathBuf,
    ) -> Result<DownloadSummary, DownloadError> {
        tokio::fs::create_dir_all(&dest_root).await.map_err(|e| {
            DownloadError::IoError(format!("failed to create {}: {e}", dest_root.display()))
        })?;

        let dest_root = dest_root.as_path();
        let total_files = files.len() as u64;
        info!(
            files = total_files,
            dest_root = %dest_root.display(),
            max_concurrency = self.max_concurrency,
            "Starting download run"
        );

        let mut summary = DownloadSummary::default();
        let mut outcomes =
            futures::stream::iter(files.into_iter().map(|file| self.transfer(file, dest_root)))
                .buffer_unordered(self.max_concurrency);

        while let Some(outcome) = outcomes.next().await {
            summary.record(&outcome);
            self.report(outcome, &summary, total_files);
        }

        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            bytes = summary.bytes_written,
            "Download run finished"
        );

        Ok(summary)
    }

    /// Log one terminal outcome and forward it to the progress sink
    fn report(&self, outcome: FileOutcome, summary: &DownloadSummary, total_files: u64) {
        match outcome.state {
            FileState::Downloaded => debug!(
                dest = %outcome.file.dest.display(),
                bytes = outcome.bytes,
                attempts = outcome.attempts,
                "File downloaded"
            ),
            FileState::Skipped => debug!(
                dest = %outcome.file.dest.display(),
                "Destination already populated, skipping"
            ),
            FileState::Failed => warn!(
                dest = %outcome.file.dest.display(),
                attempts = outcome.attempts,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "File failed"
            ),
            FileState::Cancelled => debug!(
                dest = %outcome.file.dest.display(),
                "Transfer cancelled"
            ),
            FileState::Pending | FileState::Fetching => {}
        }

        if let Some(sink) = &self.progress {
            let totals = RunTotals::from_summary(summary, total_files);
            sink.on_event(&ProgressEvent { outcome, totals });
        }
    }

    /// Drive one file to a terminal state
    async fn transfer(&self, file: FileRef, dest_root: &Path) -> FileOutcome {
        let mut outcome = FileOutcome::new(file);
        let final_path = dest_root.join(&outcome.file.dest);

        if self.shutdown_requested() {
            outcome.state = FileState::Cancelled;
            metrics::record_file_cancelled();
            return outcome;
        }

        // Populated destinations are skipped without touching the network.
        if !self.overwrite && is_populated(&final_path) {
            outcome.state = FileState::Skipped;
            metrics::record_file_skipped();
            return outcome;
        }

        if let Some(parent) = final_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                outcome.state = FileState::Failed;
                outcome.attempts = 1;
                outcome.error = Some(format!("failed to create {}: {e}", parent.display()));
                metrics::record_file_failed();
                return outcome;
            }
        }

        outcome.state = FileState::Fetching;
        let started = Instant::now();
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    dest = %outcome.file.dest.display(),
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts,
                    backoff_ms = backoff.as_millis(),
                    "Retrying after backoff delay"
                );
                metrics::record_retry_backoff(backoff, attempt);
                if !self.sleep_unless_shutdown(backoff).await {
                    outcome.state = FileState::Cancelled;
                    metrics::record_file_cancelled();
                    return outcome;
                }
            }
            outcome.attempts = attempt + 1;

            match self.fetch_to_temp(&outcome.file.url, &final_path).await {
                Ok(bytes) => {
                    outcome.state = FileState::Downloaded;
                    outcome.bytes = bytes;
                    metrics::record_file_downloaded(bytes, started.elapsed());
                    return outcome;
                }
                Err(AttemptError::Filesystem(msg)) => {
                    outcome.state = FileState::Failed;
                    outcome.error = Some(msg);
                    metrics::record_file_failed();
                    return outcome;
                }
                Err(AttemptError::Transport(msg)) => {
                    debug!(
                        dest = %outcome.file.dest.display(),
                        attempt = attempt + 1,
                        error = %msg,
                        "Attempt failed"
                    );
                    last_error = Some(msg);
                }
            }
        }

        outcome.state = FileState::Failed;
        outcome.error = last_error;
        metrics::record_file_failed();
        outcome
    }

    /// Stream the body to a temp file, then move it into place
    ///
    /// The temp file lives in the same directory as the destination so the
    /// rename stays on one filesystem. Any failure removes the temp file.
    async fn fetch_to_temp(&self, url: &str, final_path: &Path) -> Result<u64, AttemptError> {
        let temp = temp_path(final_path);

        let bytes = match self.stream_to_file(url, &temp).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&temp, final_path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(AttemptError::Filesystem(format!(
                "failed to move {} into place: {e}",
                temp.display()
            )));
        }

        Ok(bytes)
    }

    async fn stream_to_file(&self, url: &str, temp: &Path) -> Result<u64, AttemptError> {
        let mut stream = self
            .api
            .stream_file(url)
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let mut file = File::create(temp).await.map_err(|e| {
            AttemptError::Filesystem(format!("failed to create {}: {e}", temp.display()))
        })?;

        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AttemptError::Transport(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| {
                AttemptError::Filesystem(format!("failed to write {}: {e}", temp.display()))
            })?;
            bytes += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| {
            AttemptError::Filesystem(format!("failed to flush {}: {e}", temp.display()))
        })?;

        Ok(bytes)
    }

    /// Sleep for the backoff period, returning false if shutdown interrupts it
    async fn sleep_unless_shutdown(&self, backoff: Duration) -> bool {
        if let Some(shutdown) = &self.shutdown {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => true,
                _ = shutdown.wait_for_shutdown() => false,
            }
        } else {
            tokio::time::sleep(backoff).await;
            true
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Whether a destination already holds usable content
///
/// Zero-byte files count as absent so interrupted runs from older tooling
/// get their files downloaded again.
pub(crate) fn is_populated(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
