//! Constants for the download module (timeouts, limits, defaults).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default maximum payload size (100 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Number of leading body bytes inspected for an image signature.
pub const SNIFF_LEN: usize = 512;

/// Maximum accepted reference length (standard browser limit).
pub const MAX_REFERENCE_LENGTH: usize = 2000;

/// Default base delay for exponential backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default cap on a single backoff delay.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

/// File name of the failure report written into the output directory.
pub const FAILURE_REPORT_FILENAME: &str = "download_errors.csv";
