//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::filter::ValidationError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Selection rejected before any request was issued
    #[error("invalid selection: {0}")]
    ValidationError(#[from] ValidationError),

    /// Catalog error
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The run finished but some files did not download
    #[error("{failed} file(s) failed, {cancelled} cancelled")]
    Incomplete {
        /// Files that exhausted their attempts
        failed: u64,
        /// Files abandoned because shutdown was requested
        cancelled: u64,
    },
}
