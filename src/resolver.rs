//! Filter to file-link resolution
//!
//! The downloads API serves listings per (dataset, country) or
//! (dataset, city) partition; it cannot answer "all files for this filter"
//! in one request. The resolver expands a [`Filter`] into those partitions,
//! fetches every listing with bounded parallelism and merges the results
//! into one deduplicated, deterministically ordered list of [`FileRef`]s.
//!
//! A partition that keeps failing after retries becomes a warning on the
//! result, never an error; the remaining partitions still resolve.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::catalog::DatasetCatalog;
use crate::downloader::config::{
    calculate_backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_RESOLVER_CONCURRENCY,
};
use crate::fetcher::{AirQualityApi, CityEntry, PartitionPayload, PartitionSummary};
use crate::filter::Filter;
use crate::metrics;
use crate::output::DestinationLayout;

/// One downloadable observation file
///
/// `dest` is relative to the download root and doubles as the file's
/// identity: when two URLs map to the same destination, the first one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Absolute download URL
    pub url: String,
    /// Destination path relative to the download root
    pub dest: PathBuf,
    /// Size in bytes when known (listings do not carry sizes)
    pub size: Option<u64>,
}

/// Non-fatal problems hit while resolving a filter
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionWarning {
    /// A partition listing kept failing after retries
    #[error("partition {partition} failed after {attempts} attempt(s): {error}")]
    PartitionFailed {
        /// Country code or city name identifying the partition
        partition: String,
        /// Attempts made before giving up
        attempts: u32,
        /// Message from the last attempt
        error: String,
    },

    /// The city table could not be fetched, so no city partition resolved
    #[error("city lookup failed after {attempts} attempt(s): {error}")]
    CityLookupFailed {
        /// Attempts made before giving up
        attempts: u32,
        /// Message from the last attempt
        error: String,
    },

    /// A requested city is not in the API's city table
    #[error("unknown city: {0}")]
    UnknownCity(String),

    /// The selection resolved to zero files
    #[error("no files matched the selection")]
    NoMatches,

    /// The embedded catalog could not be loaded
    #[error("catalog unavailable: {0}")]
    Catalog(String),
}

/// Outcome of resolving a filter into download links
#[derive(Debug)]
pub struct Resolution {
    /// Deduplicated files, ordered by destination path
    pub files: Vec<FileRef>,
    /// Partitions or cities that could not be resolved
    pub warnings: Vec<ResolutionWarning>,
}

/// File count and size estimate for a filter, without fetching listings
#[derive(Debug, Clone)]
pub struct SelectionSummary {
    /// Number of files the selection would download
    pub files: u64,
    /// Approximate total size in megabytes
    pub megabytes: u64,
    /// Partitions that could not be summarized
    pub warnings: Vec<ResolutionWarning>,
}

/// One listing request: a country or city scoped payload
struct Partition {
    label: String,
    payload: PartitionPayload,
}

/// Expands filters into partitions and fetches their listings
pub struct LinkResolver {
    api: Arc<dyn AirQualityApi>,
    max_concurrency: usize,
    max_attempts: u32,
    layout: DestinationLayout,
}

impl LinkResolver {
    /// Create a resolver with default settings
    pub fn new(api: Arc<dyn AirQualityApi>) -> Self {
        Self {
            api,
            max_concurrency: DEFAULT_RESOLVER_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            layout: DestinationLayout::country_subdirs(),
        }
    }

    /// Set the maximum number of listing requests in flight at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Set attempts per listing request (first try included)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Override how destination paths are derived from URLs
    pub fn with_layout(mut self, layout: DestinationLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Resolve a filter into concrete download links
    ///
    /// Identical filters yield identical files in identical order, so runs
    /// can be compared and repeated.
    pub async fn resolve(&self, filter: &Filter) -> Resolution {
        let (partitions, mut warnings) = self.build_partitions(filter).await;

        info!(
            dataset = %filter.dataset(),
            partitions = partitions.len(),
            "Resolving download links"
        );

        let mut results: Vec<(usize, Result<Vec<FileRef>, ResolutionWarning>)> =
            futures::stream::iter(
                partitions
                    .iter()
                    .enumerate()
                    .map(|(index, partition)| async move {
                        (index, self.fetch_partition(partition).await)
                    }),
            )
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        // Merge in partition order; completion order depends on the network
        results.sort_by_key(|(index, _)| *index);

        let mut files = Vec::new();
        for (_, result) in results {
            match result {
                Ok(mut partition_files) => {
                    metrics::record_partition_resolved(partition_files.len());
                    files.append(&mut partition_files);
                }
                Err(warning) => {
                    metrics::record_partition_failed();
                    warn!(warning = %warning, "Partition resolution failed");
                    warnings.push(warning);
                }
            }
        }

        let files = dedup_and_sort(files);
        if files.is_empty() {
            warnings.push(ResolutionWarning::NoMatches);
        }

        info!(
            files = files.len(),
            warnings = warnings.len(),
            "Resolution complete"
        );
        Resolution { files, warnings }
    }

    /// Estimate file count and size without fetching any listing
    pub async fn summarize(&self, filter: &Filter) -> SelectionSummary {
        let (partitions, mut warnings) = self.build_partitions(filter).await;

        info!(
            dataset = %filter.dataset(),
            partitions = partitions.len(),
            "Summarizing selection"
        );

        let mut results: Vec<(usize, Result<PartitionSummary, ResolutionWarning>)> =
            futures::stream::iter(
                partitions
                    .iter()
                    .enumerate()
                    .map(|(index, partition)| async move {
                        (index, self.fetch_summary(partition).await)
                    }),
            )
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut files = 0u64;
        let mut megabytes = 0u64;
        for (_, result) in results {
            match result {
                Ok(summary) => {
                    files += summary.number_files;
                    megabytes += summary.size;
                }
                Err(warning) => {
                    warn!(warning = %warning, "Partition summary failed");
                    warnings.push(warning);
                }
            }
        }

        SelectionSummary {
            files,
            megabytes,
            warnings,
        }
    }

    /// Expand a filter into one partition per country or city
    async fn build_partitions(&self, filter: &Filter) -> (Vec<Partition>, Vec<ResolutionWarning>) {
        let mut warnings = Vec::new();

        let catalog = match DatasetCatalog::load() {
            Ok(catalog) => catalog,
            Err(e) => {
                warnings.push(ResolutionWarning::Catalog(e.to_string()));
                return (Vec::new(), warnings);
            }
        };

        let pollutants = catalog.pollutant_vocabulary_urls(filter.pollutants());
        let dataset = filter.dataset().id();
        let aggregation_type = filter.frequency().map(|f| f.as_api_str());

        let mut partitions = Vec::new();

        if filter.cities().is_empty() {
            // Country partitions; an empty country set means the whole catalog
            let countries: Vec<String> = if filter.countries().is_empty() {
                catalog.countries().to_vec()
            } else {
                filter.countries().to_vec()
            };

            for country in countries {
                partitions.push(Partition {
                    label: country.clone(),
                    payload: PartitionPayload {
                        countries: vec![country],
                        cities: Vec::new(),
                        pollutants: pollutants.clone(),
                        dataset,
                        source: "API",
                        aggregation_type,
                    },
                });
            }
        } else {
            // City partitions need the owning country, which only the API knows
            match self.fetch_city_table(catalog.countries()).await {
                Ok(table) => {
                    for city in filter.cities() {
                        match table.iter().find(|entry| entry.city_name == *city) {
                            Some(entry) => partitions.push(Partition {
                                label: city.clone(),
                                payload: PartitionPayload {
                                    countries: vec![entry.country_code.clone()],
                                    cities: vec![city.clone()],
                                    pollutants: pollutants.clone(),
                                    dataset,
                                    source: "API",
                                    aggregation_type,
                                },
                            }),
                            None => {
                                warn!(city = %city, "Unknown city, skipping");
                                warnings.push(ResolutionWarning::UnknownCity(city.clone()));
                            }
                        }
                    }
                }
                Err(warning) => {
                    warn!(warning = %warning, "City table fetch failed");
                    warnings.push(warning);
                }
            }
        }

        (partitions, warnings)
    }

    /// Fetch and parse one partition listing with retry
    async fn fetch_partition(
        &self,
        partition: &Partition,
    ) -> Result<Vec<FileRef>, ResolutionWarning> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    partition = %partition.label,
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts,
                    backoff_ms = backoff.as_millis(),
                    "Retrying partition listing after backoff delay"
                );
                metrics::record_retry_backoff(backoff, attempt);
                tokio::time::sleep(backoff).await;
            }

            match self.api.partition_urls(&partition.payload).await {
                Ok(listing) => return Ok(self.parse_listing(&listing)),
                Err(e) => {
                    debug!(
                        partition = %partition.label,
                        attempt = attempt + 1,
                        error = %e,
                        "Partition listing attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(ResolutionWarning::PartitionFailed {
            partition: partition.label.clone(),
            attempts: self.max_attempts,
            error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Fetch one partition's file count and size with retry
    async fn fetch_summary(
        &self,
        partition: &Partition,
    ) -> Result<PartitionSummary, ResolutionWarning> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    partition = %partition.label,
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts,
                    backoff_ms = backoff.as_millis(),
                    "Retrying partition summary after backoff delay"
                );
                metrics::record_retry_backoff(backoff, attempt);
                tokio::time::sleep(backoff).await;
            }

            match self.api.partition_summary(&partition.payload).await {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    debug!(
                        partition = %partition.label,
                        attempt = attempt + 1,
                        error = %e,
                        "Partition summary attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(ResolutionWarning::PartitionFailed {
            partition: partition.label.clone(),
            attempts: self.max_attempts,
            error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Fetch the API's city table with retry
    async fn fetch_city_table(
        &self,
        countries: &[String],
    ) -> Result<Vec<CityEntry>, ResolutionWarning> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts,
                    backoff_ms = backoff.as_millis(),
                    "Retrying city table fetch after backoff delay"
                );
                metrics::record_retry_backoff(backoff, attempt);
                tokio::time::sleep(backoff).await;
            }

            match self.api.cities(countries).await {
                Ok(table) => return Ok(table),
                Err(e) => {
                    debug!(attempt = attempt + 1, error = %e, "City table attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(ResolutionWarning::CityLookupFailed {
            attempts: self.max_attempts,
            error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Turn a line-oriented listing into file references
    ///
    /// The listing starts with a header line; only lines that are absolute
    /// HTTP(S) URLs count. URLs the layout cannot place are logged and
    /// dropped rather than failing the partition.
    fn parse_listing(&self, listing: &str) -> Vec<FileRef> {
        let mut files = Vec::new();
        for line in listing.lines() {
            let line = line.trim();
            if !(line.starts_with("http://") || line.starts_with("https://")) {
                continue;
            }
            match self.layout.relative_path(line) {
                Ok(dest) => files.push(FileRef {
                    url: line.to_string(),
                    dest,
                    size: None,
                }),
                Err(e) => {
                    warn!(url = line, error = %e, "Cannot derive a destination, skipping")
                }
            }
        }
        files
    }
}

/// Deduplicate by destination (first wins) and order by destination
fn dedup_and_sort(files: Vec<FileRef>) -> Vec<FileRef> {
    let mut seen = HashSet::new();
    let mut files: Vec<FileRef> = files
        .into_iter()
        .filter(|file| seen.insert(file.dest.clone()))
        .collect();
    files.sort_by(|a, b| a.dest.cmp(&b.dest));
    files
}
