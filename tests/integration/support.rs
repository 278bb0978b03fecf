//! Shared in-memory transport for integration tests
//!
//! `MockApi` scripts partition listings and file bodies, counts transport
//! calls, and tracks how many file streams were in flight at once.

use airquality_data_downloader::fetcher::{
    AirQualityApi, ByteStream, CityEntry, FetcherError, FetcherResult, PartitionPayload,
    PartitionSummary,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a listing body the way the API serves it: header line, then URLs
pub fn listing_for(urls: &[&str]) -> String {
    let mut body = String::from("ParquetFileUrl\n");
    for url in urls {
        body.push_str(url);
        body.push('\n');
    }
    body
}

/// In-memory downloads API with scripted responses and instrumentation
pub struct MockApi {
    listings: HashMap<String, String>,
    failing_partitions: HashSet<String>,
    bodies: HashMap<String, Vec<u8>>,
    failures_before_success: Mutex<HashMap<String, u32>>,
    city_table: Vec<CityEntry>,
    partition_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
            failing_partitions: HashSet::new(),
            bodies: HashMap::new(),
            failures_before_success: Mutex::new(HashMap::new()),
            city_table: Vec::new(),
            partition_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            high_water: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script one partition's listing and register a body for each URL
    pub fn with_partition(mut self, key: &str, urls: &[&str]) -> Self {
        self.listings.insert(key.to_string(), listing_for(urls));
        for url in urls {
            self.bodies
                .insert(url.to_string(), format!("body of {url}").into_bytes());
        }
        self
    }

    /// Make one partition's listing fail on every attempt
    pub fn with_failing_partition(mut self, key: &str) -> Self {
        self.failing_partitions.insert(key.to_string());
        self
    }

    /// Make one URL's stream fail `n` times before succeeding
    pub fn failing_n_times(self, url: &str, n: u32) -> Self {
        self.failures_before_success
            .lock()
            .unwrap()
            .insert(url.to_string(), n);
        self
    }

    /// Make one URL's stream fail on every attempt
    pub fn always_failing(self, url: &str) -> Self {
        self.failing_n_times(url, u32::MAX)
    }

    pub fn with_city(mut self, country: &str, city: &str) -> Self {
        self.city_table.push(CityEntry {
            country_code: country.to_string(),
            city_name: city.to_string(),
        });
        self
    }

    /// Body registered for a URL
    pub fn body_of(&self, url: &str) -> Vec<u8> {
        self.bodies.get(url).cloned().unwrap_or_default()
    }

    /// Number of `partition_urls`/`partition_summary` calls made
    pub fn partition_calls(&self) -> usize {
        self.partition_calls.load(Ordering::SeqCst)
    }

    /// Number of `stream_file` calls made
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Most file streams that were ever in flight at the same time
    pub fn concurrency_high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    fn partition_key(payload: &PartitionPayload) -> String {
        payload
            .cities
            .first()
            .or_else(|| payload.countries.first())
            .cloned()
            .unwrap_or_default()
    }
}

/// Decrements the in-flight counter when the stream it rides in is dropped
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AirQualityApi for MockApi {
    async fn cities(&self, _countries: &[String]) -> FetcherResult<Vec<CityEntry>> {
        Ok(self.city_table.clone())
    }

    async fn partition_urls(&self, payload: &PartitionPayload) -> FetcherResult<String> {
        self.partition_calls.fetch_add(1, Ordering::SeqCst);
        let key = Self::partition_key(payload);
        if self.failing_partitions.contains(&key) {
            return Err(FetcherError::HttpError(format!(
                "500 Internal Server Error for {key}"
            )));
        }
        Ok(self
            .listings
            .get(&key)
            .cloned()
            .unwrap_or_else(|| listing_for(&[])))
    }

    async fn partition_summary(
        &self,
        payload: &PartitionPayload,
    ) -> FetcherResult<PartitionSummary> {
        self.partition_calls.fetch_add(1, Ordering::SeqCst);
        let key = Self::partition_key(payload);
        if self.failing_partitions.contains(&key) {
            return Err(FetcherError::HttpError(format!(
                "500 Internal Server Error for {key}"
            )));
        }
        let number_files = self
            .listings
            .get(&key)
            .map(|listing| listing.lines().filter(|l| l.starts_with("http")).count())
            .unwrap_or(0) as u64;
        Ok(PartitionSummary {
            number_files,
            size: number_files,
        })
    }

    async fn stream_file(&self, url: &str) -> FetcherResult<ByteStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut failures = self.failures_before_success.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Err(FetcherError::NetworkError(format!(
                        "connection reset fetching {url}"
                    )));
                }
            }
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(current, Ordering::SeqCst);
        let guard = InFlightGuard(self.in_flight.clone());

        // Keep the slot occupied long enough for other transfers to start
        tokio::time::sleep(Duration::from_millis(5)).await;

        let body = Bytes::from(self.body_of(url));
        let stream = futures::stream::once(async move {
            let _guard = guard;
            Ok(body)
        });
        Ok(Box::pin(stream))
    }

    fn base_url(&self) -> &str {
        "mock://"
    }
}
