//! Shared result collection for one batch run.

use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::download::batch::{
    BatchResult, DownloadItem, FailedItem, FailureReason, ItemOutcome,
};
use crate::download::events::EventSink;

#[derive(Debug)]
struct AggregateState {
    completed: usize,
    outcomes: Vec<Option<ItemOutcome>>,
}

/// Records terminal outcomes by input index.
///
/// The progress event is sent while the lock is held, so `completed` values
/// reach the channel in strictly increasing order.
#[derive(Debug)]
pub(crate) struct Aggregator {
    total: usize,
    events: EventSink,
    state: Mutex<AggregateState>,
}

impl Aggregator {
    pub(crate) fn new(total: usize, events: EventSink) -> Self {
        let mut outcomes = Vec::with_capacity(total);
        outcomes.resize_with(total, || None);
        Self {
            total,
            events,
            state: Mutex::new(AggregateState {
                completed: 0,
                outcomes,
            }),
        }
    }

    /// Records the outcome for `index`; a second record for the same index is ignored.
    pub(crate) fn record(&self, index: usize, outcome: ItemOutcome, label: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = state.outcomes.get_mut(index) else {
            warn!(index, total = self.total, "outcome index out of range");
            return;
        };
        if slot.is_some() {
            warn!(index, "outcome already recorded");
            return;
        }
        *slot = Some(outcome);
        state.completed += 1;
        self.events.progress(state.completed, self.total, label);
    }

    /// Builds the final result in input order.
    ///
    /// Indices with no recorded outcome (their worker died) are reported as
    /// [`FailureReason::Internal`] using the matching entry of `originals`.
    pub(crate) fn into_result(
        self,
        originals: Vec<DownloadItem>,
        cancelled_by_user: bool,
    ) -> BatchResult {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut result = BatchResult {
            total: self.total,
            cancelled_by_user,
            ..BatchResult::default()
        };

        for (outcome, original) in state.outcomes.into_iter().zip(originals) {
            match outcome {
                Some(ItemOutcome::Succeeded(file)) => {
                    result.succeeded += 1;
                    result.downloaded.push(file);
                }
                Some(ItemOutcome::Failed(failed)) => result.failed.push(failed),
                None => result.failed.push(internal_failure(original)),
            }
        }

        result
    }
}

/// Failure recorded for an item whose worker never reported back.
pub(crate) fn internal_failure(mut item: DownloadItem) -> FailedItem {
    item.error = Some("worker stopped before recording an outcome".to_string());
    FailedItem {
        item,
        reason: FailureReason::Internal,
        attempts: 0,
    }
}
