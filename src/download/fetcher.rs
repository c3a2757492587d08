//! The seam between the orchestrator and the network.
//!
//! One [`Fetcher::fetch`] call is one attempt: request, validate, reserve a
//! path, write. The engine owns retries and bookkeeping; the fetcher owns I/O.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::DownloadError;
use super::validate::ImageFormat;

/// Inputs for a single fetch attempt.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Direct-fetch URL produced by the reference resolver.
    pub url: &'a Url,
    /// Name requested by the data source, if any.
    pub desired_name: Option<&'a str>,
    /// Directory to write into.
    pub output_dir: &'a Path,
    /// Largest accepted payload in bytes.
    pub max_payload_bytes: u64,
    /// Batch cancellation; honored until the output file is reserved.
    pub cancel: &'a CancellationToken,
}

/// A payload that was validated and written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Reserved output path.
    pub path: PathBuf,
    /// File name component of `path`.
    pub name: String,
    /// Bytes written.
    pub bytes_written: u64,
    /// Detected image format.
    pub format: ImageFormat,
}

/// Performs one fetch-validate-write attempt.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `request.url` into `request.output_dir`.
    ///
    /// # Errors
    ///
    /// Any [`DownloadError`]; the engine classifies it for retry.
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchedFile, DownloadError>;
}
