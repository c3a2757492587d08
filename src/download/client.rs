//! HTTP client wrapper for fetching images.
//!
//! This module provides the `HttpClient` struct which performs one
//! fetch-validate-write attempt per call: size and type are checked from the
//! headers and the leading bytes before any file is created, and the body is
//! then streamed into a collision-safe reserved path.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::DownloadError;
use super::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS, SNIFF_LEN};
use super::fetcher::{FetchRequest, FetchedFile, Fetcher};
use super::filename::{derive_name, finalize_desired_name, reserve_unique_path};
use super::validate::{ImageFormat, check_declared_length, validate_payload};

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("image-downloader/", env!("CARGO_PKG_VERSION"));

/// HTTP client for fetching images with streaming support.
///
/// This client is designed to be created once and reused for the whole
/// batch, taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use image_downloader_core::download::{FetchRequest, Fetcher, HttpClient, resolve_reference};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let url = resolve_reference("https://example.com/cat.jpg")?;
/// let cancel = CancellationToken::new();
/// let file = client
///     .fetch(FetchRequest {
///         url: &url,
///         desired_name: None,
///         output_dir: Path::new("./downloads"),
///         max_payload_bytes: 10 * 1024 * 1024,
///         cancel: &cancel,
///     })
///     .await?;
/// println!("Downloaded to: {}", file.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 10 seconds
    /// - Request timeout: 30 seconds
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::try_with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
        .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client with explicit timeouts.
    ///
    /// The connect timeout is clamped to the request timeout.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend or system configuration
    /// cannot be initialized.
    pub fn try_with_timeouts(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout.min(request_timeout))
            .timeout(request_timeout)
            .gzip(true)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchedFile, DownloadError> {
        let url = request.url.as_str();
        debug!("starting fetch");

        // Nothing is on disk until the path is reserved, so this phase can
        // bail out as soon as the batch is cancelled.
        let response = tokio::select! {
            biased;
            () = request.cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            result = self.client.get(request.url.clone()).send() => {
                result.map_err(|e| DownloadError::network(url, e))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let declared_length = response.content_length();
        check_declared_length(url, declared_length, request.max_payload_bytes)?;

        let mut stream = response.bytes_stream();
        let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
        let mut exhausted = false;
        while head.len() < SNIFF_LEN {
            let next = tokio::select! {
                biased;
                () = request.cancel.cancelled() => return Err(DownloadError::cancelled(url)),
                next = stream.next() => next,
            };
            match next {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
                    head.extend_from_slice(&chunk);
                    ensure_within_limit(url, head.len() as u64, request.max_payload_bytes)?;
                }
                None => {
                    exhausted = true;
                    break;
                }
            }
        }

        let sample = &head[..head.len().min(SNIFF_LEN)];
        let format = validate_payload(
            url,
            content_type.as_deref(),
            sample,
            declared_length,
            request.max_payload_bytes,
        )?;

        // The declared type names the file; the sniffed format covers a
        // missing or non-image header.
        let naming_format = content_type
            .as_deref()
            .and_then(ImageFormat::from_mime)
            .unwrap_or(format);
        let name = match request.desired_name {
            Some(desired) => finalize_desired_name(desired, naming_format.extension()),
            None => derive_name(request.url, Some(naming_format.mime_type())),
        };

        let (path, file) = reserve_unique_path(request.output_dir, &name)
            .await
            .map_err(|e| DownloadError::io(request.output_dir.join(&name), e))?;
        debug!(path = %path.display(), %format, "reserved output path");

        let remaining = if exhausted { None } else { Some(stream) };
        let write_result =
            write_payload(file, &head, remaining, url, &path, request.max_payload_bytes).await;

        let bytes_written = match write_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        let name = path
            .file_name()
            .map_or(name, |n| n.to_string_lossy().into_owned());
        info!(path = %path.display(), bytes = bytes_written, "fetch complete");

        Ok(FetchedFile {
            path,
            name,
            bytes_written,
            format,
        })
    }
}

fn ensure_within_limit(url: &str, observed: u64, limit: u64) -> Result<(), DownloadError> {
    if observed > limit {
        return Err(DownloadError::too_large(url, observed, limit));
    }
    Ok(())
}

/// Writes the sniffed head, then the rest of the body, returning bytes written.
///
/// Extracted so the caller can remove the reserved file on any error.
async fn write_payload<S, B>(
    file: File,
    head: &[u8],
    remaining: Option<S>,
    url: &str,
    path: &Path,
    max_payload_bytes: u64,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut writer = BufWriter::new(file);
    writer
        .write_all(head)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut bytes_written = head.len() as u64;

    if let Some(mut stream) = remaining {
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
            let chunk = chunk.as_ref();
            bytes_written += chunk.len() as u64;
            ensure_within_limit(url, bytes_written, max_payload_bytes)?;
            writer
                .write_all(chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
        }
    }

    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;
    Ok(bytes_written)
}
