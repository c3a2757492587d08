//! Error types for the download module.
//!
//! This module defines structured errors for a single fetch attempt,
//! providing context-rich error messages for logs and the failure report.

use std::path::PathBuf;

use thiserror::Error;

use super::batch::FailureReason;

/// Errors that can occur while resolving, fetching, validating or writing one item.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The reference is not a usable HTTP/HTTPS URL.
    #[error("invalid reference '{reference}': {reason}")]
    InvalidReference {
        /// The reference as supplied by the data source.
        reference: String,
        /// Why the reference was rejected.
        reason: String,
    },

    /// Payload exceeds the configured size ceiling.
    #[error("payload too large downloading {url}: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// The URL being fetched.
        url: String,
        /// Declared or observed size in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// Neither the content type nor the leading bytes identify an image.
    #[error("not an image downloading {url} (content type: {})", content_type.as_deref().unwrap_or("none"))]
    NotAnImage {
        /// The URL being fetched.
        url: String,
        /// Declared content type, if any.
        content_type: Option<String>,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while reserving or writing the output file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The batch was cancelled while this attempt was waiting on the network.
    #[error("cancelled downloading {url}")]
    Cancelled {
        /// The URL being fetched.
        url: String,
    },
}

impl DownloadError {
    /// Creates an invalid reference error.
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Creates a payload-too-large error.
    pub fn too_large(url: impl Into<String>, size: u64, limit: u64) -> Self {
        Self::TooLarge {
            url: url.into(),
            size,
            limit,
        }
    }

    /// Creates a not-an-image error.
    pub fn not_an_image(url: impl Into<String>, content_type: Option<&str>) -> Self {
        Self::NotAnImage {
            url: url.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    /// Creates a network error from a reqwest error.
    ///
    /// Timeouts are promoted to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Maps this error onto the per-item failure taxonomy.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::InvalidReference { .. } => FailureReason::InvalidReference,
            Self::TooLarge { .. } => FailureReason::TooLarge,
            Self::NotAnImage { .. } => FailureReason::NotAnImage,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                FailureReason::Transient
            }
            Self::Io { .. } => FailureReason::Storage,
            Self::Cancelled { .. } => FailureReason::Cancelled,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/a.jpg");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/a.jpg"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/a.jpg", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("https://example.com/a.jpg"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_too_large_display_has_both_sizes() {
        let error = DownloadError::too_large("https://example.com/a.jpg", 10_485_760, 1_048_576);
        let msg = error.to_string();
        assert!(msg.contains("10485760"));
        assert!(msg.contains("1048576"));
    }

    #[test]
    fn test_download_error_not_an_image_display_without_content_type() {
        let error = DownloadError::not_an_image("https://example.com/page", None);
        assert!(error.to_string().contains("content type: none"));

        let error = DownloadError::not_an_image("https://example.com/page", Some("text/html"));
        assert!(error.to_string().contains("text/html"));
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.jpg"), io_error);
        assert!(error.to_string().contains("/tmp/test.jpg"));
    }

    #[test]
    fn test_download_error_reason_mapping() {
        assert_eq!(
            DownloadError::invalid_reference("x", "no scheme").reason(),
            FailureReason::InvalidReference
        );
        assert_eq!(
            DownloadError::too_large("u", 2, 1).reason(),
            FailureReason::TooLarge
        );
        assert_eq!(
            DownloadError::not_an_image("u", None).reason(),
            FailureReason::NotAnImage
        );
        assert_eq!(
            DownloadError::http_status("u", 500).reason(),
            FailureReason::Transient
        );
        assert_eq!(DownloadError::timeout("u").reason(), FailureReason::Transient);
        assert_eq!(DownloadError::cancelled("u").reason(), FailureReason::Cancelled);
        let io_err = std::io::Error::other("disk full");
        assert_eq!(
            DownloadError::io("/tmp/x", io_err).reason(),
            FailureReason::Storage
        );
    }
}
