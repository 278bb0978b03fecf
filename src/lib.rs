//! # Air Quality Data Downloader Library
//!
//! A library for bulk downloading air quality observation files from the
//! European Environment Agency (EEA) Parquet downloads service. Designed for
//! researchers and pipelines that need thousands of observation files without
//! discovering and fetching each link by hand.
//!
//! ## Features
//!
//! - **Filtered selection**: restrict downloads by dataset, country,
//!   pollutant, city, and aggregation frequency
//! - **Two-phase pipeline**: resolve a filter into concrete file links, then
//!   fetch them with bounded concurrency
//! - **Atomic writes**: files are streamed to a temporary name and renamed on
//!   completion, so readers never observe partial files
//! - **Partial failure tolerance**: one partition or file failing never
//!   aborts the rest of the run
//! - **Skip/overwrite policy**: existing non-empty files are skipped without
//!   a network call unless overwrite is requested
//! - **Type-Safe**: filters are validated against the dataset catalog before
//!   any request is issued
//!
//! ## Quick Start
//!
//! ```no_run
//! use airquality_data_downloader::{Dataset, Filter};
//! use airquality_data_downloader::downloader::DownloadEngine;
//! use airquality_data_downloader::fetcher::create_api_client;
//! use airquality_data_downloader::resolver::LinkResolver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Verified observations for two countries, one pollutant
//! let filter = Filter::builder(Dataset::Verified)
//!     .countries(["NL", "DE"])
//!     .pollutants(["PM10"])
//!     .build()?;
//!
//! let api = create_api_client();
//!
//! // Phase 1: resolve the filter into file links
//! let resolution = LinkResolver::new(api.clone()).resolve(&filter).await;
//!
//! // Phase 2: fetch the links into ./data
//! let engine = DownloadEngine::new(api);
//! let summary = engine.run(resolution.files, "data".into()).await?;
//! println!("downloaded {} file(s)", summary.downloaded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`catalog`] - Embedded tables of known countries and pollutants
//! - [`filter`] - Validated, immutable download selection
//! - [`fetcher`] - Transport layer for the downloads API and file servers
//! - [`resolver`] - Filter to file-link resolution with partition retry
//! - [`downloader`] - Bounded-concurrency download engine with atomic writes
//! - [`output`] - Destination path derivation and directory handling
//! - [`shutdown`] - Graceful shutdown coordination shared across modules
//!
//! ## Datasets
//!
//! The downloads service partitions observations into three datasets:
//!
//! - [`Dataset::Historical`] - Airbase data delivered between 2002 and 2012
//! - [`Dataset::Verified`] - E1a data from 2013 onwards, verified yearly
//! - [`Dataset::Unverified`] - E2a up-to-date data, transmitted continuously

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Embedded catalog of known countries and pollutants
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Download engine with retry and atomic writes
pub mod downloader;

/// Transport layer for the downloads API
pub mod fetcher;

/// Validated download selection
pub mod filter;

/// Prometheus metrics registration and recording
pub mod metrics;

/// Destination path derivation
pub mod output;

/// Filter to file-link resolution
pub mod resolver;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

// Re-export commonly used types
pub use downloader::{DownloadEngine, DownloadSummary};
pub use filter::{Filter, FilterBuilder, ValidationError};
pub use resolver::{FileRef, LinkResolver};

/// Dataset kind exposed by the Parquet downloads API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    /// Historical Airbase data delivered between 2002 and 2012, before the
    /// 2008 Air Quality Directive entered into force
    #[serde(rename = "historical")]
    Historical,
    /// Verified data (E1a) from 2013 onwards, reported by countries by
    /// 30 September each year for the previous year
    #[serde(rename = "verified")]
    Verified,
    /// Unverified data (E2a, up-to-date) transmitted continuously
    #[serde(rename = "unverified")]
    Unverified,
}

impl Dataset {
    /// Numeric dataset id used in API request payloads
    pub fn id(&self) -> u8 {
        match self {
            Dataset::Historical => 3,
            Dataset::Verified => 2,
            Dataset::Unverified => 1,
        }
    }

    /// All dataset kinds, in API id order
    pub fn all() -> [Dataset; 3] {
        [Dataset::Historical, Dataset::Verified, Dataset::Unverified]
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dataset::Historical => "historical",
            Dataset::Verified => "verified",
            Dataset::Unverified => "unverified",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "historical" | "airbase" => Ok(Dataset::Historical),
            "verified" | "e1a" => Ok(Dataset::Verified),
            "unverified" | "e2a" => Ok(Dataset::Unverified),
            _ => Err(format!("Invalid dataset: {s}")),
        }
    }
}

/// Aggregation frequency of observation files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Hourly aggregated observations
    #[serde(rename = "hourly")]
    Hourly,
    /// Daily aggregated observations
    #[serde(rename = "daily")]
    Daily,
    /// Variable/other aggregation intervals
    #[serde(rename = "variable")]
    Variable,
}

impl Frequency {
    /// Wire value carried in the `aggregationType` payload field
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hour",
            Frequency::Daily => "day",
            Frequency::Variable => "var",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Variable => "variable",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" | "hour" => Ok(Frequency::Hourly),
            "daily" | "day" => Ok(Frequency::Daily),
            "variable" | "var" | "other" => Ok(Frequency::Variable),
            _ => Err(format!("Invalid frequency: {s}")),
        }
    }
}
