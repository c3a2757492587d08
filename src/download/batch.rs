//! Batch data model: items, configuration, per-item outcomes and the final result.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_CONCURRENCY, DEFAULT_MAX_PAYLOAD_BYTES};
use super::retry::DEFAULT_MAX_RETRIES;

/// One unit of work: a reference plus its eventual name and outcome.
///
/// Only the worker handling an item mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    /// Raw reference as supplied by the data source.
    pub reference: String,
    /// Name requested by the data source, if any.
    pub desired_name: Option<String>,
    /// Final file name the item landed at (or was attempting).
    pub resolved_name: Option<String>,
    /// Last error message, set on terminal failure.
    pub error: Option<String>,
}

impl DownloadItem {
    /// Creates an item without a desired name.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            desired_name: None,
            resolved_name: None,
            error: None,
        }
    }

    /// Creates an item with a desired name.
    #[must_use]
    pub fn named(reference: impl Into<String>, desired_name: impl Into<String>) -> Self {
        Self {
            desired_name: Some(desired_name.into()),
            ..Self::new(reference)
        }
    }

    /// Label used in progress events: resolved name, else the reference.
    #[must_use]
    pub fn label(&self) -> &str {
        self.resolved_name.as_deref().unwrap_or(&self.reference)
    }
}

/// Immutable configuration for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items in input order.
    pub items: Vec<DownloadItem>,
    /// Directory downloads are written into; created if missing.
    pub output_dir: PathBuf,
    /// Number of concurrent workers (1-100).
    pub concurrency: usize,
    /// Retries allowed after the first attempt for transient failures.
    pub max_retries: u32,
    /// Largest accepted payload in bytes.
    pub max_payload_bytes: u64,
}

impl BatchConfig {
    /// Creates a config with default concurrency, retries and payload ceiling.
    #[must_use]
    pub fn new(items: Vec<DownloadItem>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            items,
            output_dir: output_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the payload ceiling.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max_payload_bytes: u64) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }
}

/// Why an item did not end up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Malformed or unsupported reference; never fetched.
    InvalidReference,
    /// Payload exceeds the size ceiling.
    TooLarge,
    /// Payload is not a recognized image.
    NotAnImage,
    /// Network, timeout or non-2xx failure that outlived its retries.
    #[serde(rename = "transient_network_error")]
    Transient,
    /// Output file could not be reserved or written.
    Storage,
    /// Batch was cancelled before this item finished.
    Cancelled,
    /// Worker task ended without recording an outcome.
    Internal,
}

impl FailureReason {
    /// Stable label used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidReference => "invalid_reference",
            Self::TooLarge => "too_large",
            Self::NotAnImage => "not_an_image",
            Self::Transient => "transient_network_error",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item that reached a terminal state other than success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// The item with `error` (and `resolved_name` when known) filled in.
    pub item: DownloadItem,
    /// Failure class.
    pub reason: FailureReason,
    /// Attempts made before the item reached this state.
    pub attempts: u32,
}

/// An item that was written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    /// Original reference.
    pub reference: String,
    /// Where the payload landed.
    pub path: PathBuf,
    /// Payload size.
    pub bytes: u64,
    /// Attempts it took.
    pub attempts: u32,
}

/// Final aggregate of one batch run.
///
/// Invariant: `succeeded + failed.len() == total`. Cancelled items are part of
/// `failed` with [`FailureReason::Cancelled`]; use [`Self::cancelled_count`]
/// and [`Self::error_count`] to tell them apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Number of items in the batch.
    pub total: usize,
    /// Number of items written to disk.
    pub succeeded: usize,
    /// Items that did not succeed, in input order.
    pub failed: Vec<FailedItem>,
    /// Items that succeeded, in input order.
    pub downloaded: Vec<DownloadedFile>,
    /// Whether `cancel()` was observed during the run.
    pub cancelled_by_user: bool,
}

impl BatchResult {
    /// Number of items that were cancelled.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.failed
            .iter()
            .filter(|f| f.reason == FailureReason::Cancelled)
            .count()
    }

    /// Number of items that failed for a reason other than cancellation.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.failed.len() - self.cancelled_count()
    }

    /// True when every item succeeded.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Terminal outcome of one item, produced by a worker.
#[derive(Debug)]
pub(crate) enum ItemOutcome {
    Succeeded(DownloadedFile),
    Failed(FailedItem),
}
