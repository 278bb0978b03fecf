//! Operational metrics for download runs
//!
//! This module provides metrics collection for monitoring partition
//! resolution, retry behavior and per-file download outcomes.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for a scraping endpoint, installed on demand
//! - Recording without an installed exporter is a no-op, so library users
//!   pay nothing unless they opt in

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Called once at application startup when an exporter address is
/// configured. The function is idempotent and will not reinitialize if
/// already called.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "partitions_resolved_total",
        Unit::Count,
        "Total number of partition listings resolved successfully"
    );

    describe_counter!(
        "partition_failures_total",
        Unit::Count,
        "Total number of partitions that failed after all retries"
    );

    describe_counter!(
        "partition_links_total",
        Unit::Count,
        "Total number of download links produced by partition listings"
    );

    describe_counter!(
        "files_downloaded_total",
        Unit::Count,
        "Total number of files downloaded and moved into place"
    );

    describe_counter!(
        "files_skipped_total",
        Unit::Count,
        "Total number of files skipped because the destination was populated"
    );

    describe_counter!(
        "files_failed_total",
        Unit::Count,
        "Total number of files that exhausted attempts or hit filesystem errors"
    );

    describe_counter!(
        "files_cancelled_total",
        Unit::Count,
        "Total number of files abandoned because shutdown was requested"
    );

    describe_counter!(
        "bytes_downloaded_total",
        Unit::Bytes,
        "Total bytes written across downloaded files"
    );

    describe_histogram!(
        "file_download_duration_seconds",
        Unit::Seconds,
        "Wall time from first attempt to completed download, per file"
    );

    describe_counter!(
        "download_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );

    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Record one successfully resolved partition and its link count
pub fn record_partition_resolved(links: usize) {
    counter!("partitions_resolved_total").increment(1);
    counter!("partition_links_total").increment(links as u64);
}

/// Record a partition that failed after all retries
pub fn record_partition_failed() {
    counter!("partition_failures_total").increment(1);
}

/// Record a completed file download
pub fn record_file_downloaded(bytes: u64, duration: Duration) {
    counter!("files_downloaded_total").increment(1);
    counter!("bytes_downloaded_total").increment(bytes);
    histogram!("file_download_duration_seconds").record(duration.as_secs_f64());
}

/// Record a file skipped without a network request
pub fn record_file_skipped() {
    counter!("files_skipped_total").increment(1);
}

/// Record a file that reached the failed state
pub fn record_file_failed() {
    counter!("files_failed_total").increment(1);
}

/// Record a file cancelled by shutdown
pub fn record_file_cancelled() {
    counter!("files_cancelled_total").increment(1);
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "download_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!(
        "retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());

    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis(),
        "Retry backoff recorded"
    );
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
