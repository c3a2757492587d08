//! Image Downloader Core Library
//!
//! This library downloads batches of image references into a local folder
//! with bounded concurrency, retries for transient failures, content
//! validation and collision-safe naming.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Reference resolution, validation, naming, retry and the
//!   concurrent batch engine
//! - [`source`] - Parsing of `url[,name]` listings into download items
//! - [`report`] - CSV failure report and one-line summaries

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod report;
pub mod source;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use download::constants::{DEFAULT_CONCURRENCY, DEFAULT_MAX_PAYLOAD_BYTES};
pub use download::{
    BatchConfig, BatchResult, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadError, DownloadItem,
    DownloadedFile, EngineError, FailedItem, FailureReason, FailureType, Fetcher, HttpClient,
    RetryDecision, RetryPolicy, classify_error,
};
pub use report::{ReportError, render_summary, write_failure_report};
pub use source::{SourceError, SourceParseResult, parse_items, read_items};
