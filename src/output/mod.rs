//! Destination path derivation and directory handling

pub mod path;

pub use path::{temp_path, DestinationLayout};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// URL does not yield a usable destination path
    #[error("unusable URL: {0}")]
    UnusableUrl(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
