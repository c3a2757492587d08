//! Worker loop and the per-item attempt/retry flow.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::aggregator::Aggregator;
use crate::download::DownloadError;
use crate::download::batch::{
    DownloadItem, DownloadedFile, FailedItem, FailureReason, ItemOutcome,
};
use crate::download::events::EventSink;
use crate::download::fetcher::{FetchRequest, Fetcher};
use crate::download::filename::{DEFAULT_IMAGE_EXTENSION, derive_name, finalize_desired_name};
use crate::download::reference::resolve_reference;
use crate::download::retry::{RetryDecision, RetryPolicy, classify_error};

/// Items waiting for a worker, tagged with their input index.
pub(crate) type WorkQueue = Mutex<VecDeque<(usize, DownloadItem)>>;

/// Everything a worker needs that is shared across the batch.
pub(crate) struct WorkerContext {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) events: EventSink,
    pub(crate) cancel: CancellationToken,
    pub(crate) policy: RetryPolicy,
    pub(crate) output_dir: PathBuf,
    pub(crate) max_payload_bytes: u64,
}

/// Pulls items until the queue is empty.
///
/// After cancellation the remaining items are still drained, each one
/// recorded as cancelled without any network activity.
pub(crate) async fn run_worker(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    queue: Arc<WorkQueue>,
    aggregator: Arc<Aggregator>,
) {
    debug!(worker_id, "worker started");
    let mut handled = 0usize;

    loop {
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some((index, item)) = next else {
            break;
        };

        let outcome = process_item(&ctx, item).await;
        let label = match &outcome {
            ItemOutcome::Succeeded(file) => file
                .path
                .file_name()
                .map_or_else(|| file.reference.clone(), |n| n.to_string_lossy().into_owned()),
            ItemOutcome::Failed(failed) => failed.item.label().to_string(),
        };
        aggregator.record(index, outcome, &label);
        handled += 1;
    }

    debug!(worker_id, handled, "worker finished");
}

#[instrument(skip(ctx, item), fields(reference = %item.reference))]
async fn process_item(ctx: &WorkerContext, mut item: DownloadItem) -> ItemOutcome {
    if ctx.cancel.is_cancelled() {
        return cancelled(item, 0);
    }

    let url = match resolve_reference(&item.reference) {
        Ok(url) => url,
        Err(e) => return failed(ctx, item, &e, 1),
    };
    item.resolved_name = Some(attempted_name(&url, item.desired_name.as_deref()));

    let mut attempt = 0u32;
    loop {
        if ctx.cancel.is_cancelled() {
            return cancelled(item, attempt);
        }
        debug!(attempt, "starting attempt");

        let request = FetchRequest {
            url: &url,
            desired_name: item.desired_name.as_deref(),
            output_dir: &ctx.output_dir,
            max_payload_bytes: ctx.max_payload_bytes,
            cancel: &ctx.cancel,
        };

        match ctx.fetcher.fetch(request).await {
            Ok(file) => {
                ctx.events.info(format!("Downloaded {}", file.name));
                return ItemOutcome::Succeeded(DownloadedFile {
                    reference: item.reference,
                    path: file.path,
                    bytes: file.bytes_written,
                    attempts: attempt + 1,
                });
            }
            Err(e) => {
                // A failure observed after cancellation is never retried.
                if ctx.cancel.is_cancelled() || matches!(e, DownloadError::Cancelled { .. }) {
                    return cancelled(item, attempt + 1);
                }

                match ctx.policy.decide(classify_error(&e), attempt) {
                    RetryDecision::Retry {
                        delay,
                        next_attempt,
                    } => {
                        ctx.events.warning(format!(
                            "Attempt {} failed for {}. Retrying in {}... ({e})",
                            attempt + 1,
                            item.reference,
                            format_delay(delay)
                        ));
                        tokio::select! {
                            biased;
                            () = ctx.cancel.cancelled() => return cancelled(item, attempt + 1),
                            () = tokio::time::sleep(delay) => {}
                        }
                        attempt = next_attempt;
                    }
                    RetryDecision::GiveUp { reason } => {
                        debug!(%reason, "not retrying");
                        return failed(ctx, item, &e, attempt + 1);
                    }
                }
            }
        }
    }
}

/// Name recorded before the first attempt, so failures can report it.
///
/// The extension is provisional; the fetcher picks the real one from the payload.
fn attempted_name(url: &Url, desired_name: Option<&str>) -> String {
    match desired_name {
        Some(desired) => finalize_desired_name(desired, DEFAULT_IMAGE_EXTENSION),
        None => derive_name(url, None),
    }
}

fn failed(ctx: &WorkerContext, mut item: DownloadItem, error: &DownloadError, attempts: u32) -> ItemOutcome {
    ctx.events
        .error(format!("Failed to download {}: {error}", item.reference));
    item.error = Some(error.to_string());
    ItemOutcome::Failed(FailedItem {
        item,
        reason: error.reason(),
        attempts,
    })
}

fn cancelled(mut item: DownloadItem, attempts: u32) -> ItemOutcome {
    debug!(reference = %item.reference, attempts, "item cancelled");
    item.error = Some("cancelled".to_string());
    ItemOutcome::Failed(FailedItem {
        item,
        reason: FailureReason::Cancelled,
        attempts,
    })
}

/// Renders a backoff delay as seconds with one decimal, e.g. `2.0s`.
pub(crate) fn format_delay(delay: Duration) -> String {
    format!("{:.1}s", delay.as_secs_f64())
}
