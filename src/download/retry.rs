//! Retry logic with exponential backoff for transient download failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying download errors and determining retry behavior.
//!
//! # Overview
//!
//! When an attempt fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - network errors, timeouts, non-2xx responses
//! - [`FailureType::Terminal`] - invalid reference, oversized or non-image
//!   payloads, local write failures, cancellation
//!
//! The [`RetryPolicy`] then decides whether another attempt is allowed and
//! how long to wait first. Attempts are numbered from 0; the delay before the
//! retry that follows attempt `i` is `base * 2^i`, capped at `max_delay`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use image_downloader_core::download::{
//!     DownloadError, RetryPolicy, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::with_max_retries(3);
//! let error = DownloadError::http_status("https://example.com/a.jpg", 503);
//!
//! match policy.decide(classify_error(&error), 0) {
//!     RetryDecision::Retry { delay, next_attempt } => {
//!         assert_eq!(delay, Duration::from_secs(1));
//!         assert_eq!(next_attempt, 1);
//!     }
//!     RetryDecision::GiveUp { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::{DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY};

/// Default maximum retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Classification of attempt failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Failure that no amount of retrying will fix.
    Terminal,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Index of the attempt that will follow (0-based).
        next_attempt: u32,
    },

    /// Stop retrying; the last failure is final.
    GiveUp {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_retries`: 3 (so at most 4 attempts)
/// - `base_delay`: 1 second
/// - `max_delay`: 60 seconds
/// - `jitter`: none
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    max_retries: u32,
    /// Delay before the first retry.
    base_delay: Duration,
    /// Cap for any single delay.
    max_delay: Duration,
    /// Upper bound of random jitter added to each delay.
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: Duration::ZERO,
        }
    }

    /// Creates a policy with a custom retry count, using defaults for delays.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Returns a copy of this policy with random jitter up to `jitter` added to each delay.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the maximum number of retries configured.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the base backoff delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Whether another attempt may follow the (0-based) `attempt_index`.
    #[must_use]
    pub fn should_retry(&self, attempt_index: u32) -> bool {
        attempt_index < self.max_retries
    }

    /// Delay to wait after the failed attempt `attempt_index` (0-based).
    ///
    /// Formula: `min(base_delay * 2^attempt_index, max_delay) + jitter`
    #[must_use]
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        delay + self.calculate_jitter()
    }

    /// Determines whether to retry a failed attempt.
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn decide(&self, failure_type: FailureType, attempt_index: u32) -> RetryDecision {
        if failure_type == FailureType::Terminal {
            return RetryDecision::GiveUp {
                reason: "terminal failure - retry would not help".to_string(),
            };
        }

        if !self.should_retry(attempt_index) {
            debug!(attempt_index, max = self.max_retries, "retries exhausted");
            return RetryDecision::GiveUp {
                reason: format!("max retries ({}) exhausted", self.max_retries),
            };
        }

        let delay = self.backoff_delay(attempt_index);
        debug!(
            attempt_index,
            next_attempt = attempt_index + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            next_attempt: attempt_index + 1,
        }
    }

    fn calculate_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout, any non-2xx status | Transient |
/// | InvalidReference, TooLarge, NotAnImage | Terminal |
/// | Io (local write) | Terminal |
/// | Cancelled | Terminal |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::HttpStatus { .. } => FailureType::Transient,

        DownloadError::InvalidReference { .. }
        | DownloadError::TooLarge { .. }
        | DownloadError::NotAnImage { .. }
        | DownloadError::Io { .. }
        | DownloadError::Cancelled { .. } => FailureType::Terminal,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert!(policy.jitter.is_zero());
    }

    #[test]
    fn test_should_retry_counts_from_zero() {
        let policy = RetryPolicy::with_max_retries(3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = RetryPolicy::with_max_retries(0);
        assert!(!policy.should_retry(0));
        assert!(matches!(
            policy.decide(FailureType::Transient, 0),
            RetryDecision::GiveUp { .. }
        ));
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_respects_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(6), Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1))
            .with_jitter(Duration::from_millis(50));
        for _ in 0..100 {
            let delay = policy.backoff_delay(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_decide_terminal_never_retries() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(FailureType::Terminal, 0);
        assert!(matches!(decision, RetryDecision::GiveUp { ref reason } if reason.contains("terminal")));
    }

    #[test]
    fn test_decide_transient_retries_until_exhausted() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_secs(1));
        assert_eq!(
            policy.decide(FailureType::Transient, 0),
            RetryDecision::Retry {
                delay: Duration::from_millis(10),
                next_attempt: 1
            }
        );
        assert_eq!(
            policy.decide(FailureType::Transient, 1),
            RetryDecision::Retry {
                delay: Duration::from_millis(20),
                next_attempt: 2
            }
        );
        let decision = policy.decide(FailureType::Transient, 2);
        assert!(matches!(decision, RetryDecision::GiveUp { ref reason } if reason.contains("exhausted")));
    }

    #[test]
    fn test_classify_transient_errors() {
        assert_eq!(
            classify_error(&DownloadError::http_status("u", 500)),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::http_status("u", 404)),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::timeout("u")),
            FailureType::Transient
        );
    }

    #[test]
    fn test_classify_terminal_errors() {
        assert_eq!(
            classify_error(&DownloadError::invalid_reference("x", "bad")),
            FailureType::Terminal
        );
        assert_eq!(
            classify_error(&DownloadError::too_large("u", 2, 1)),
            FailureType::Terminal
        );
        assert_eq!(
            classify_error(&DownloadError::not_an_image("u", None)),
            FailureType::Terminal
        );
        assert_eq!(
            classify_error(&DownloadError::cancelled("u")),
            FailureType::Terminal
        );
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            classify_error(&DownloadError::io("/x", io_err)),
            FailureType::Terminal
        );
    }
}
