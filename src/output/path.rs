//! Destination path derivation for downloaded files
//!
//! Observation file URLs end in `<country>/<file>.parquet`; those last two
//! path segments become the file's destination relative to the download
//! root. A flat layout drops the country directory.
//!
//! # Usage Example
//!
//! ```rust
//! use airquality_data_downloader::output::DestinationLayout;
//! use std::path::PathBuf;
//!
//! let layout = DestinationLayout::country_subdirs();
//! let path = layout
//!     .relative_path("https://eea.example/dataset/NL/SPO-NL00301.parquet")
//!     .unwrap();
//! assert_eq!(path, PathBuf::from("NL/SPO-NL00301.parquet"));
//! ```

use super::{OutputError, OutputResult};
use std::path::{Path, PathBuf};

/// Suffix appended to in-progress downloads before the atomic rename
const TEMP_SUFFIX: &str = ".part";

/// Destination layout policy for resolved files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationLayout {
    country_subdir: bool,
}

impl DestinationLayout {
    /// Files land in per-country subdirectories (the default)
    pub fn country_subdirs() -> Self {
        Self {
            country_subdir: true,
        }
    }

    /// All files land directly in the download root
    pub fn flat() -> Self {
        Self {
            country_subdir: false,
        }
    }

    /// Derive the destination path, relative to the download root, for a
    /// download URL
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::UnusableUrl`] when the URL carries too few
    /// path segments to name a destination.
    pub fn relative_path(&self, url: &str) -> OutputResult<PathBuf> {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        let path_part = match without_query.find("://") {
            Some(idx) => {
                let after_scheme = &without_query[idx + 3..];
                match after_scheme.find('/') {
                    Some(slash) => &after_scheme[slash + 1..],
                    None => "",
                }
            }
            None => without_query,
        };

        let segments: Vec<&str> = path_part.split('/').filter(|s| !s.is_empty()).collect();
        let file = segments
            .last()
            .copied()
            .ok_or_else(|| OutputError::UnusableUrl(url.to_string()))?;

        if !self.country_subdir {
            return Ok(PathBuf::from(sanitize_segment(file)));
        }

        if segments.len() < 2 {
            return Err(OutputError::UnusableUrl(url.to_string()));
        }
        let country = segments[segments.len() - 2];
        Ok(PathBuf::from(sanitize_segment(country)).join(sanitize_segment(file)))
    }
}

impl Default for DestinationLayout {
    fn default() -> Self {
        Self::country_subdirs()
    }
}

/// Path of the temporary file a download streams into
///
/// The temporary file lives next to its final destination; rename across
/// filesystems would not be atomic.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    final_path.with_file_name(name)
}

/// Sanitize a path segment for filesystem safety
///
/// Replaces `..` and separator characters so a hostile URL cannot place a
/// file outside the download root.
fn sanitize_segment(name: &str) -> String {
    name.replace("..", "__").replace(['/', '\\', ':'], "_")
}
