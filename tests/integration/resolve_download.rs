//! End-to-end resolve-then-download scenarios against the in-memory transport

use std::path::PathBuf;
use std::sync::Arc;

use airquality_data_downloader::downloader::DownloadEngine;
use airquality_data_downloader::resolver::{LinkResolver, ResolutionWarning};
use airquality_data_downloader::{Dataset, Filter};
use tempfile::TempDir;

use super::support::MockApi;

const NL_URLS: [&str; 5] = [
    "https://data.example.com/E1a/NL/NL_5_100.parquet",
    "https://data.example.com/E1a/NL/NL_5_101.parquet",
    "https://data.example.com/E1a/NL/NL_5_102.parquet",
    "https://data.example.com/E1a/NL/NL_5_103.parquet",
    "https://data.example.com/E1a/NL/NL_5_104.parquet",
];

const DE_URLS: [&str; 7] = [
    "https://data.example.com/E1a/DE/DE_5_200.parquet",
    "https://data.example.com/E1a/DE/DE_5_201.parquet",
    "https://data.example.com/E1a/DE/DE_5_202.parquet",
    "https://data.example.com/E1a/DE/DE_5_203.parquet",
    "https://data.example.com/E1a/DE/DE_5_204.parquet",
    "https://data.example.com/E1a/DE/DE_5_205.parquet",
    "https://data.example.com/E1a/DE/DE_5_206.parquet",
];

fn two_partition_api() -> Arc<MockApi> {
    Arc::new(
        MockApi::new()
            .with_partition("NL", &NL_URLS)
            .with_partition("DE", &DE_URLS),
    )
}

fn two_country_filter() -> Filter {
    Filter::builder(Dataset::Verified)
        .countries(["NL", "DE"])
        .pollutants(["NO3"])
        .build()
        .unwrap()
}

#[tokio::test]
async fn twelve_links_resolve_and_download_into_empty_destination() {
    let api = two_partition_api();
    let dest = TempDir::new().unwrap();

    let resolution = LinkResolver::new(api.clone())
        .resolve(&two_country_filter())
        .await;
    assert_eq!(resolution.files.len(), 12);
    assert!(resolution.warnings.is_empty());

    let summary = DownloadEngine::new(api.clone())
        .with_max_concurrency(4)
        .run(resolution.files.clone(), dest.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 12);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.cancelled, 0);
    assert!(summary.is_complete_success());

    // Every file landed at its destination with the full body
    for file in &resolution.files {
        let on_disk = std::fs::read(dest.path().join(&file.dest)).unwrap();
        assert_eq!(on_disk, api.body_of(&file.url));
    }
    assert_eq!(summary.bytes_written, total_body_bytes(&api, &resolution.files));
}

#[tokio::test]
async fn preexisting_destinations_are_skipped() {
    let api = two_partition_api();
    let dest = TempDir::new().unwrap();

    let resolution = LinkResolver::new(api.clone())
        .resolve(&two_country_filter())
        .await;
    assert_eq!(resolution.files.len(), 12);

    // Three of the twelve targets already exist with content
    for file in resolution.files.iter().take(3) {
        let path = dest.path().join(&file.dest);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"already here").unwrap();
    }

    let summary = DownloadEngine::new(api.clone())
        .with_max_concurrency(4)
        .run(resolution.files.clone(), dest.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 9);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(api.stream_calls(), 9);

    // Skipped files keep their original content
    for file in resolution.files.iter().take(3) {
        let on_disk = std::fs::read(dest.path().join(&file.dest)).unwrap();
        assert_eq!(on_disk, b"already here");
    }
}

#[tokio::test]
async fn failing_partition_warns_and_the_rest_downloads() {
    let api = Arc::new(
        MockApi::new()
            .with_partition("NL", &NL_URLS)
            .with_failing_partition("DE"),
    );
    let dest = TempDir::new().unwrap();

    let resolution = LinkResolver::new(api.clone())
        .with_max_attempts(1)
        .resolve(&two_country_filter())
        .await;

    assert_eq!(resolution.files.len(), 5);
    assert!(resolution
        .files
        .iter()
        .all(|f| f.dest.starts_with("NL")));
    // One listing request per partition, no retries configured
    assert_eq!(api.partition_calls(), 2);
    assert_eq!(resolution.warnings.len(), 1);
    assert!(matches!(
        &resolution.warnings[0],
        ResolutionWarning::PartitionFailed { partition, .. } if partition == "DE"
    ));

    let summary = DownloadEngine::new(api)
        .with_max_concurrency(4)
        .run(resolution.files, dest.path().to_path_buf())
        .await
        .unwrap();
    assert_eq!(summary.downloaded, 5);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn duplicate_destinations_across_partitions_resolve_once() {
    // Both partitions list a URL mapping to the same destination path
    let shared = "https://mirror.example.com/E1a/NL/NL_5_100.parquet";
    let api = Arc::new(
        MockApi::new()
            .with_partition("NL", &["https://data.example.com/E1a/NL/NL_5_100.parquet"])
            .with_partition("DE", &[shared, "https://data.example.com/E1a/DE/DE_5_200.parquet"]),
    );

    let resolution = LinkResolver::new(api)
        .resolve(&two_country_filter())
        .await;

    let dests: Vec<PathBuf> = resolution.files.iter().map(|f| f.dest.clone()).collect();
    assert_eq!(
        dests,
        vec![
            PathBuf::from("DE/DE_5_200.parquet"),
            PathBuf::from("NL/NL_5_100.parquet"),
        ]
    );
    // Keep-first: countries are stored sorted, so the DE partition's
    // listing is merged first and its URL wins
    let kept = resolution
        .files
        .iter()
        .find(|f| f.dest == PathBuf::from("NL/NL_5_100.parquet"))
        .unwrap();
    assert_eq!(kept.url, shared);
}

#[tokio::test]
async fn summarize_reports_without_downloading() {
    let api = two_partition_api();

    let summary = LinkResolver::new(api.clone())
        .summarize(&two_country_filter())
        .await;

    assert_eq!(summary.files, 12);
    assert_eq!(summary.megabytes, 12);
    assert!(summary.warnings.is_empty());
    assert_eq!(api.stream_calls(), 0);
}

fn total_body_bytes(
    api: &MockApi,
    files: &[airquality_data_downloader::resolver::FileRef],
) -> u64 {
    files.iter().map(|f| api.body_of(&f.url).len() as u64).sum()
}
