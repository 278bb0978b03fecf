//! HTTP implementation of the downloads API transport
//!
//! One [`HttpApi`] instance talks to the Parquet downloads API and to the
//! file servers its URL listings point at. All instances share the global
//! HTTP client so connection pooling spans concurrent downloads.

use futures::StreamExt;
use reqwest::{Client, Response};
use std::sync::Arc;
use tracing::debug;

use crate::fetcher::shared_resources::global_http_client;
use crate::fetcher::{
    AirQualityApi, ByteStream, CityEntry, FetcherError, FetcherResult, PartitionPayload,
    PartitionSummary,
};
use async_trait::async_trait;

/// Production base URL of the Parquet downloads API
pub const API_BASE_URL: &str = "https://eeadmz1-downloads-api-appservice.azurewebsites.net";

/// Station metadata export endpoint
pub const METADATA_URL: &str = "https://discomap.eea.europa.eu/App/AQViewer/download?fqn=Airquality_Dissem.b2g.measurements&f=csv";

/// HTTP transport for the downloads API
pub struct HttpApi {
    client: Arc<Client>,
    base_url: String,
}

impl HttpApi {
    /// Create a transport against the production API
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL)
    }

    /// Create a transport against a different base URL (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: global_http_client(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Default for HttpApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AirQualityApi for HttpApi {
    async fn cities(&self, countries: &[String]) -> FetcherResult<Vec<CityEntry>> {
        let url = self.endpoint("/City");
        debug!("Requesting city table for {} countries", countries.len());

        let response = self
            .client
            .post(&url)
            .json(&countries)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;
        let response = error_for_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| FetcherError::ParseError(format!("city table: {e}")))
    }

    async fn partition_urls(&self, payload: &PartitionPayload) -> FetcherResult<String> {
        let url = self.endpoint("/ParquetFile/urls");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;
        let response = error_for_status(response).await?;

        response
            .text()
            .await
            .map_err(|e| FetcherError::NetworkError(format!("url listing body: {e}")))
    }

    async fn partition_summary(
        &self,
        payload: &PartitionPayload,
    ) -> FetcherResult<PartitionSummary> {
        let url = self.endpoint("/DownloadSummary");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;
        let response = error_for_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| FetcherError::ParseError(format!("download summary: {e}")))
    }

    async fn stream_file(&self, url: &str) -> FetcherResult<ByteStream> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;
        let response = error_for_status(response).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| FetcherError::NetworkError(e.to_string())));
        Ok(Box::pin(stream))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Turn a non-success response into an error carrying status and body text
async fn error_for_status(response: Response) -> FetcherResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unreadable body".to_string());
    Err(FetcherError::HttpError(format!("{status}: {body}")))
}
