//! Batch image download engine.
//!
//! This module turns a list of [`DownloadItem`]s into files on disk:
//! references are resolved to direct-fetch URLs, each payload is checked for
//! size and image type before anything is written, names are reserved without
//! overwriting, and transient failures are retried with exponential backoff.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Image detection by magic bytes, falling back to `Content-Type`
//! - Dropbox and Google Drive share links rewritten to direct downloads
//! - Atomic collision handling (adds numeric suffix)
//! - Bounded worker pool with cooperative cancellation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use image_downloader_core::download::{
//!     BatchConfig, DownloadEngine, DownloadItem, HttpClient, event_channel,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, mut rx) = event_channel();
//! let engine = DownloadEngine::new(Arc::new(HttpClient::new())).with_events(tx);
//! let config = BatchConfig::new(
//!     vec![DownloadItem::named("https://example.com/p/1.png", "red-shoe")],
//!     "./downloads",
//! )
//! .with_concurrency(8);
//! let result = engine.run(config).await?;
//! drop(engine);
//! while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! println!("Downloaded: {}", result.succeeded);
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
pub mod constants;
mod engine;
mod error;
mod events;
mod fetcher;
pub mod filename;
mod reference;
mod retry;
mod validate;

pub use batch::{
    BatchConfig, BatchResult, DownloadItem, DownloadedFile, FailedItem, FailureReason,
};
pub use client::{DEFAULT_USER_AGENT, HttpClient};
pub use engine::{DownloadEngine, EngineError, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use error::DownloadError;
pub use events::{
    EngineEvent, EventReceiver, EventSender, LogEvent, LogLevel, ProgressEvent, event_channel,
};
pub use fetcher::{FetchRequest, FetchedFile, Fetcher};
pub use filename::{derive_name, finalize_desired_name, reserve_unique_path, sanitize_filename};
pub use reference::resolve_reference;
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use validate::{ImageFormat, check_declared_length, validate_payload};
