//! Download engine and per-file transfer lifecycle
//!
//! This module turns resolved file links into files on disk, with bounded
//! concurrency, per-file retry and atomic writes.
//!
//! # Overview
//!
//! A download run walks through the following stages:
//!
//! 1. **Input**: a list of [`crate::resolver::FileRef`]s, usually produced by
//!    [`crate::resolver::LinkResolver`]
//! 2. **Skip check**: populated destinations are skipped without any network
//!    request unless overwrite is enabled
//! 3. **Transfer**: each remaining file streams to a `.part` temp file and is
//!    renamed into place once the body completed
//! 4. **Aggregation**: every terminal outcome is folded into one
//!    [`DownloadSummary`] and reported through the optional [`ProgressSink`]
//! 5. **Shutdown**: a shutdown request lets in-flight transfers finish and
//!    marks the rest cancelled
//!
//! # Quick Start
//!
//! ```no_run
//! use airquality_data_downloader::downloader::DownloadEngine;
//! use airquality_data_downloader::fetcher::create_api_client;
//! use airquality_data_downloader::resolver::FileRef;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Files usually come from the resolver; one can be built by hand too
//! let file = FileRef {
//!     url: "https://example.com/E1a/NL_5_12345.parquet".to_string(),
//!     dest: "NL/NL_5_12345.parquet".into(),
//!     size: None,
//! };
//!
//! let engine = DownloadEngine::new(create_api_client()).with_max_concurrency(20);
//! let summary = engine.run(vec![file], "data".into()).await?;
//! assert_eq!(summary.total(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`engine`] - Bounded-concurrency engine with retry and atomic writes
//! - [`transfer`] - Per-file transfer states and the run summary
//! - [`progress`] - Terminal-outcome progress events
//! - [`metadata`] - Station metadata sidecar download
//! - [`config`] - Tuning constants and backoff calculation
//!
//! # Error Handling
//!
//! Per-file faults never abort a run; they surface as failed entries in the
//! [`DownloadSummary`]. Within one file:
//! - Network errors (retried with exponential backoff)
//! - Filesystem errors (fail the file immediately, never retried)
//! - Archive errors (malformed metadata archive, never retried)
//!
//! # Related Modules
//!
//! - [`crate::resolver`] - Produces the file links this module consumes
//! - [`crate::fetcher`] - Transport used to stream file bodies
//! - [`crate::output`] - Destination and temp path derivation

pub mod config;
pub mod engine;
pub mod metadata;
pub mod progress;
pub mod transfer;

pub use engine::DownloadEngine;
pub use metadata::{fetch_metadata, MetadataOutcome, METADATA_FILENAME};
pub use progress::{ProgressEvent, ProgressSink, RunTotals};
pub use transfer::{DownloadSummary, FileFailure, FileOutcome, FileState};

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Network error
    #[error("network error: {0}")]
    NetworkError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Malformed metadata archive
    #[error("archive error: {0}")]
    ArchiveError(String),
}
