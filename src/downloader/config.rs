//! Download configuration constants

use std::time::Duration;

/// Default number of attempts per network operation (first try included).
/// Three attempts with exponential backoff ride out transient faults without
/// stalling a large run on a partition that is genuinely down.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default number of concurrent file transfers.
/// Observation files are small (tens of kB to a few MB each), so a wide pool
/// keeps the download phase throughput-bound rather than latency-bound.
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// Default number of concurrent partition listing requests.
/// Each listing call makes the API enumerate a whole country or city, which
/// is far heavier per request than serving a file, so the resolver uses a
/// narrower pool than the download engine.
pub const DEFAULT_RESOLVER_CONCURRENCY: usize = 10;

/// Initial backoff delay in milliseconds.
/// 1 second is long enough for transient server hiccups to clear but short
/// enough to not overly delay recovery.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
/// 30 seconds caps exponential backoff to prevent excessive wait times.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS * 2u64.pow(retry_count);
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
