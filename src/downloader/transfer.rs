//! Per-file transfer state and run summary types

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::resolver::FileRef;

/// Lifecycle state of a single file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileState {
    /// Transfer has not started yet
    #[default]
    Pending,
    /// Transfer is currently streaming from the server
    Fetching,
    /// File was written and moved into place
    Downloaded,
    /// Destination already held a non-empty file, no network request made
    Skipped,
    /// All attempts exhausted or a filesystem error occurred
    Failed,
    /// Shutdown was requested before this transfer finished
    Cancelled,
}

impl FileState {
    /// Whether this state ends the transfer lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Downloaded | FileState::Skipped | FileState::Failed | FileState::Cancelled
        )
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Pending => "pending",
            FileState::Fetching => "fetching",
            FileState::Downloaded => "downloaded",
            FileState::Skipped => "skipped",
            FileState::Failed => "failed",
            FileState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Result of one file transfer, emitted exactly once when the transfer
/// reaches a terminal state
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// The file this outcome belongs to
    pub file: FileRef,
    /// Terminal state reached by the transfer
    pub state: FileState,
    /// Bytes written to the destination (zero unless downloaded)
    pub bytes: u64,
    /// Attempts made (zero when no network request was issued)
    pub attempts: u32,
    /// Error message for failed transfers
    pub error: Option<String>,
}

impl FileOutcome {
    pub(crate) fn new(file: FileRef) -> Self {
        Self {
            file,
            state: FileState::Pending,
            bytes: 0,
            attempts: 0,
            error: None,
        }
    }
}

/// A single failed transfer, kept for end-of-run reporting
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    /// Destination path relative to the download root
    pub dest: PathBuf,
    /// Message from the last attempt
    pub error: String,
    /// Attempts made before giving up
    pub attempts: u32,
}

/// Aggregate counts for a completed download run
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    /// Files fetched and moved into place
    pub downloaded: u64,
    /// Files left untouched because the destination was already populated
    pub skipped: u64,
    /// Files that exhausted their attempts or hit a filesystem error
    pub failed: u64,
    /// Files abandoned because shutdown was requested
    pub cancelled: u64,
    /// Total bytes written across all downloaded files
    pub bytes_written: u64,
    /// Details for every failed transfer
    pub failures: Vec<FileFailure>,
}

impl DownloadSummary {
    /// Total number of files that reached a terminal state
    pub fn total(&self) -> u64 {
        self.downloaded + self.skipped + self.failed + self.cancelled
    }

    /// Whether every file either downloaded or was already in place
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    /// Fold one terminal outcome into the running totals
    pub(crate) fn record(&mut self, outcome: &FileOutcome) {
        match outcome.state {
            FileState::Downloaded => {
                self.downloaded += 1;
                self.bytes_written += outcome.bytes;
            }
            FileState::Skipped => self.skipped += 1,
            FileState::Failed => {
                self.failed += 1;
                self.failures.push(FileFailure {
                    dest: outcome.file.dest.clone(),
                    error: outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                    attempts: outcome.attempts,
                });
            }
            FileState::Cancelled => self.cancelled += 1,
            FileState::Pending | FileState::Fetching => {}
        }
    }
}
