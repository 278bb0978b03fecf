//! Progress reporting for download runs
//!
//! The engine emits exactly one [`ProgressEvent`] per file, when that file
//! reaches a terminal state. Consumers that want a live display implement
//! [`ProgressSink`] and hand it to the engine; the default is no reporting.

use crate::downloader::transfer::{DownloadSummary, FileOutcome};

/// Running totals at the moment an event was emitted
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    /// Files downloaded so far
    pub downloaded: u64,
    /// Files skipped so far
    pub skipped: u64,
    /// Files failed so far
    pub failed: u64,
    /// Files cancelled so far
    pub cancelled: u64,
    /// Bytes written so far
    pub bytes: u64,
    /// Total number of files in the run
    pub total_files: u64,
}

impl RunTotals {
    pub(crate) fn from_summary(summary: &DownloadSummary, total_files: u64) -> Self {
        Self {
            downloaded: summary.downloaded,
            skipped: summary.skipped,
            failed: summary.failed,
            cancelled: summary.cancelled,
            bytes: summary.bytes_written,
            total_files,
        }
    }

    /// Number of files that have reached a terminal state
    pub fn completed(&self) -> u64 {
        self.downloaded + self.skipped + self.failed + self.cancelled
    }

    /// Completion percentage (0.0 to 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            100.0
        } else {
            (self.completed() as f64 / self.total_files as f64) * 100.0
        }
    }

    /// Whether every file in the run has reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total_files
    }
}

/// One terminal outcome together with the totals after recording it
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// The outcome that triggered this event
    pub outcome: FileOutcome,
    /// Run totals including this outcome
    pub totals: RunTotals,
}

/// Receiver for per-file progress events
///
/// Implementations must be cheap and non-blocking; the engine calls
/// [`ProgressSink::on_event`] from its aggregation loop.
pub trait ProgressSink: Send + Sync {
    /// Called once per file, when it reaches a terminal state
    fn on_event(&self, event: &ProgressEvent);
}
