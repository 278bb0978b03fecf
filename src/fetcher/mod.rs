//! Transport layer for the downloads API
//!
//! The [`AirQualityApi`] trait is the seam between the resolution/download
//! pipeline and the network: metadata endpoints on one side, observation
//! file servers on the other. Production code uses the `reqwest`-backed
//! [`http::HttpApi`]; tests substitute in-memory implementations.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

pub mod http;
pub mod shared_resources;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Network-level failure (connect, timeout, broken body stream)
    #[error("network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response body did not match the expected shape
    #[error("parse error: {0}")]
    ParseError(String),
}

/// Result type for transport operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Stream of body chunks from a file download
pub type ByteStream = Pin<Box<dyn Stream<Item = FetcherResult<Bytes>> + Send>>;

/// Request payload for the partition-scoped endpoints
///
/// One payload describes one (dataset, country) or (dataset, city)
/// partition. `pollutants` carries vocabulary URLs, not notations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPayload {
    /// Country codes (exactly one for country partitions; the city's
    /// country for city partitions)
    pub countries: Vec<String>,
    /// City names (empty for country partitions)
    pub cities: Vec<String>,
    /// Pollutant vocabulary URLs, sorted (empty = all pollutants)
    pub pollutants: Vec<String>,
    /// Numeric dataset id
    pub dataset: u8,
    /// Request origin marker, always `"API"`
    pub source: &'static str,
    /// Aggregation restriction (`hour`/`day`/`var`), omitted when absent
    #[serde(rename = "aggregationType", skip_serializing_if = "Option::is_none")]
    pub aggregation_type: Option<&'static str>,
}

/// Reply from the download summary endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PartitionSummary {
    /// Number of files the partition would download
    #[serde(rename = "numberFiles")]
    pub number_files: u64,
    /// Approximate total size in megabytes
    pub size: u64,
}

/// One row of the API's city table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CityEntry {
    /// Country the city belongs to
    #[serde(rename = "countryCode")]
    pub country_code: String,
    /// City name as used in partition payloads
    #[serde(rename = "cityName")]
    pub city_name: String,
}

/// Transport handle for the downloads API and its file servers
///
/// Implementations must be cheap to share (`Arc`) between the resolver and
/// the download engine.
#[async_trait]
pub trait AirQualityApi: Send + Sync {
    /// City table for the given countries
    async fn cities(&self, countries: &[String]) -> FetcherResult<Vec<CityEntry>>;

    /// Raw download-URL listing for one partition
    ///
    /// The response is line-oriented text: a header line followed by one
    /// URL per line. Parsing is the resolver's concern.
    async fn partition_urls(&self, payload: &PartitionPayload) -> FetcherResult<String>;

    /// File count and approximate size for one partition
    async fn partition_summary(&self, payload: &PartitionPayload)
        -> FetcherResult<PartitionSummary>;

    /// Stream one file's body
    async fn stream_file(&self, url: &str) -> FetcherResult<ByteStream>;

    /// Base URL served by this transport (diagnostics)
    fn base_url(&self) -> &str;
}

/// Create the production transport backed by the shared HTTP client
pub fn create_api_client() -> Arc<dyn AirQualityApi> {
    Arc::new(http::HttpApi::new())
}
