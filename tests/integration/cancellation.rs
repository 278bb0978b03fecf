//! Graceful shutdown: every file ends in a terminal state, no temp files remain

use std::path::PathBuf;
use std::sync::Arc;

use airquality_data_downloader::downloader::{
    DownloadEngine, FileState, ProgressEvent, ProgressSink,
};
use airquality_data_downloader::resolver::FileRef;
use airquality_data_downloader::shutdown::{SharedShutdown, ShutdownCoordinator};
use tempfile::TempDir;

use super::support::MockApi;

fn fleet(api: MockApi, count: usize) -> (Arc<MockApi>, Vec<FileRef>) {
    let urls: Vec<String> = (0..count)
        .map(|i| format!("https://data.example.com/E1a/NL/NL_5_{i:03}.parquet"))
        .collect();
    let url_refs: Vec<&str> = urls.iter().map(|u| u.as_str()).collect();
    let api = Arc::new(api.with_partition("NL", &url_refs));
    let files = urls
        .iter()
        .enumerate()
        .map(|(i, url)| FileRef {
            url: url.clone(),
            dest: PathBuf::from(format!("NL/NL_5_{i:03}.parquet")),
            size: None,
        })
        .collect();
    (api, files)
}

/// Requests shutdown as soon as the first file reaches a terminal state
struct CancelAfterFirst(SharedShutdown);

impl ProgressSink for CancelAfterFirst {
    fn on_event(&self, _event: &ProgressEvent) {
        self.0.request_shutdown();
    }
}

#[tokio::test]
async fn shutdown_before_run_cancels_everything() {
    let (api, files) = fleet(MockApi::new(), 6);
    let dest = TempDir::new().unwrap();

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let summary = DownloadEngine::new(api.clone())
        .with_shutdown(shutdown)
        .run(files, dest.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(summary.cancelled, 6);
    assert_eq!(summary.total(), 6);
    assert_eq!(api.stream_calls(), 0);
    assert!(std::fs::read_dir(dest.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn mid_run_shutdown_finishes_in_flight_and_cancels_the_rest() {
    let (api, files) = fleet(MockApi::new(), 10);
    let dest = TempDir::new().unwrap();

    let shutdown = ShutdownCoordinator::shared();
    let summary = DownloadEngine::new(api.clone())
        .with_max_concurrency(1)
        .with_shutdown(shutdown.clone())
        .with_progress(Arc::new(CancelAfterFirst(shutdown.clone())))
        .run(files.clone(), dest.path().to_path_buf())
        .await
        .unwrap();

    // One transfer completed before shutdown was requested; with a pool of
    // one, everything else was cancelled before its first attempt
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.cancelled, 9);
    assert_eq!(summary.total(), 10);

    // Completed files stay on disk; nothing else was written
    let mut written = 0;
    for file in &files {
        let path = dest.path().join(&file.dest);
        if path.exists() {
            written += 1;
            assert_eq!(std::fs::read(&path).unwrap(), api.body_of(&file.url));
        }
        assert!(!path.with_extension("parquet.part").exists());
    }
    assert_eq!(written, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_backoff_cancels_the_file() {
    let url = "https://data.example.com/E1a/NL/NL_5_000.parquet";
    let api = Arc::new(
        MockApi::new()
            .with_partition("NL", &[url])
            .always_failing(url),
    );
    let dest = TempDir::new().unwrap();

    let shutdown = ShutdownCoordinator::shared();
    let shutdown_trigger = shutdown.clone();
    tokio::spawn(async move {
        // Land inside the first backoff window (backoff starts at 1s)
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        shutdown_trigger.request_shutdown();
    });

    let summary = DownloadEngine::new(api.clone())
        .with_max_attempts(3)
        .with_shutdown(shutdown)
        .run(
            vec![FileRef {
                url: url.to_string(),
                dest: PathBuf::from("NL/NL_5_000.parquet"),
                size: None,
            }],
            dest.path().to_path_buf(),
        )
        .await
        .unwrap();

    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.total(), 1);
    // The first attempt ran, the retry never did
    assert_eq!(api.stream_calls(), 1);
    assert!(!dest.path().join("NL/NL_5_000.parquet").exists());
}

#[tokio::test]
async fn every_outcome_is_terminal_after_cancellation() {
    let (api, files) = fleet(MockApi::new(), 8);
    let dest = TempDir::new().unwrap();

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let summary = DownloadEngine::new(api)
        .with_shutdown(shutdown)
        .run(files, dest.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(summary.total(), 8);
    assert!(FileState::Cancelled.is_terminal());
}
