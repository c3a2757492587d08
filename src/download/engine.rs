//! Download engine for concurrent batch downloads with retry support.
//!
//! This module provides the `DownloadEngine` which runs a fixed pool of
//! workers over a shared queue of [`DownloadItem`]s, retrying transient
//! failures with exponential backoff and collecting every outcome into a
//! single [`BatchResult`].
//!
//! # Overview
//!
//! - At most `concurrency` fetches are in flight at any moment.
//! - Every item reaches exactly one terminal state and is counted once.
//! - Progress and log lines go out through an optional event channel.
//! - [`DownloadEngine::cancel`] stops new work promptly; fetches that are
//!   already writing to disk are allowed to finish.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use image_downloader_core::download::{BatchConfig, DownloadEngine, DownloadItem, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(Arc::new(HttpClient::new()));
//! let items = vec![DownloadItem::new("https://example.com/cat.jpg")];
//! let result = engine.run(BatchConfig::new(items, "./downloads")).await?;
//! println!("Succeeded: {}, Failed: {}", result.succeeded, result.failed.len());
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod task;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::batch::{BatchConfig, BatchResult, DownloadItem};
use super::constants::{DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY};
use super::events::{EventSender, EventSink};
use super::fetcher::Fetcher;
use super::retry::RetryPolicy;
use aggregator::{Aggregator, internal_failure};
use task::{WorkerContext, run_worker};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Error type for download engine operations.
///
/// Only setup problems surface here; per-item failures are part of the
/// [`BatchResult`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Payload ceiling of zero.
    #[error("invalid payload limit: must be greater than zero")]
    InvalidPayloadLimit,

    /// Output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs download batches.
///
/// The engine holds one cancellation token for its whole lifetime: after
/// [`cancel`](Self::cancel), any further `run` reports every item as
/// cancelled.
pub struct DownloadEngine {
    fetcher: Arc<dyn Fetcher>,
    events: EventSink,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
    retry_jitter: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("retry_jitter", &self.retry_jitter)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine that fetches through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            events: EventSink::default(),
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            retry_jitter: Duration::ZERO,
            cancel: CancellationToken::new(),
        }
    }

    /// Sends progress and log events to `tx`.
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.events = EventSink::new(Some(tx));
        self
    }

    /// Overrides the backoff base delay and cap.
    #[must_use]
    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    /// Adds up to `jitter` of random delay to each backoff.
    #[must_use]
    pub fn with_retry_jitter(mut self, jitter: Duration) -> Self {
        self.retry_jitter = jitter;
        self
    }

    /// Requests cancellation of the current and any future batch.
    ///
    /// Idempotent; callable from any task or thread.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("cancellation requested");
        }
        self.cancel.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of the engine's token, for wiring signal handlers.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Downloads every item in `config` and returns the aggregate result.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if concurrency is outside
    /// 1-100, [`EngineError::InvalidPayloadLimit`] if the ceiling is zero, and
    /// [`EngineError::OutputDir`] if the output directory cannot be created.
    ///
    /// Individual download failures do NOT cause this method to error.
    #[instrument(skip(self, config), fields(
        items = config.items.len(),
        concurrency = config.concurrency,
        output_dir = %config.output_dir.display()
    ))]
    pub async fn run(&self, config: BatchConfig) -> Result<BatchResult, EngineError> {
        validate_config(&config)?;

        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|source| EngineError::OutputDir {
                path: config.output_dir.clone(),
                source,
            })?;

        let total = config.items.len();
        let originals = config.items.clone();
        let worker_count = config.concurrency.min(total).max(MIN_CONCURRENCY);

        info!(total, worker_count, "starting batch");

        let ctx = Arc::new(WorkerContext {
            fetcher: Arc::clone(&self.fetcher),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            policy: RetryPolicy::new(
                config.max_retries,
                self.retry_base_delay,
                self.retry_max_delay,
            )
            .with_jitter(self.retry_jitter),
            output_dir: config.output_dir,
            max_payload_bytes: config.max_payload_bytes,
        });
        let queue = Arc::new(Mutex::new(
            config.items.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let aggregator = Arc::new(Aggregator::new(total, self.events.clone()));

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&ctx),
                    Arc::clone(&queue),
                    Arc::clone(&aggregator),
                ))
            })
            .collect();

        debug!(worker_count, "waiting for workers to finish");
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "download worker panicked");
            }
        }
        drop(queue);
        drop(ctx);

        let cancelled_by_user = self.cancel.is_cancelled();
        let result = match Arc::try_unwrap(aggregator) {
            Ok(aggregator) => aggregator.into_result(originals, cancelled_by_user),
            // Every worker has been joined, so no other owner can remain.
            Err(_) => unreachable_aggregator(originals, cancelled_by_user),
        };

        if cancelled_by_user {
            self.events.info(format!(
                "Download cancelled: {} item(s) not completed",
                result.cancelled_count()
            ));
        }

        info!(
            succeeded = result.succeeded,
            failed = result.error_count(),
            cancelled = result.cancelled_count(),
            total = result.total,
            "batch complete"
        );

        Ok(result)
    }
}

fn validate_config(config: &BatchConfig) -> Result<(), EngineError> {
    if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
        return Err(EngineError::InvalidConcurrency {
            value: config.concurrency,
        });
    }
    if config.max_payload_bytes == 0 {
        return Err(EngineError::InvalidPayloadLimit);
    }
    Ok(())
}

/// Every item becomes an `Internal` failure so the totals still add up.
fn unreachable_aggregator(originals: Vec<DownloadItem>, cancelled_by_user: bool) -> BatchResult {
    error!("aggregator still shared after all workers joined");
    let failed: Vec<_> = originals.into_iter().map(internal_failure).collect();
    BatchResult {
        total: failed.len(),
        failed,
        cancelled_by_user,
        ..BatchResult::default()
    }
}
