//! Retry logic with fixed backoff for transient request failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying request errors and determining retry behavior, plus
//! [`retry_with_policy`], the loop every network operation runs through.
//!
//! # Overview
//!
//! When a request fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - network trouble, timeouts, any non-auth
//!   error status, or an undecodable body; retried after a fixed delay
//! - [`FailureType::NeedsAuth`] - the credential was rejected (401/403);
//!   never retried, so callers can run credential recovery instead
//! - [`FailureType::Permanent`] - local problems (disk, bad URL, bad proxy)
//!   that a retry cannot fix
//!
//! # Example
//!
//! ```
//! use catalog_export::download::{DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://api.example.com/feed?page=1", 503);
//! assert_eq!(classify_error(&error), FailureType::Transient);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => println!("retry #{attempt} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::DownloadError;

/// Default maximum attempts per request (including the first).
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default fixed delay between attempts (2 seconds).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Classification of request failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Failure that won't succeed regardless of retries.
    Permanent,

    /// The server rejected the credential.
    NeedsAuth,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry budget with a fixed delay between attempts.
///
/// # Default Values
///
/// - `max_attempts`: 10
/// - `delay`: 2 seconds
///
/// A request that fails every attempt is attempted exactly `max_attempts`
/// times with `max_attempts - 1` sleeps in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Fixed delay between attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit attempt cap and delay.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "credential rejected - retry with the same token would not help"
                        .to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a request error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 401 / 403 | NeedsAuth |
/// | any other non-2xx status | Transient |
/// | Timeout, Network | Transient |
/// | Decode (malformed body) | Transient |
/// | Io, InvalidUrl, InvalidProxy, ClientBuild | Permanent |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::AuthRequired { .. } => FailureType::NeedsAuth,
        DownloadError::HttpStatus { status, .. } if matches!(status, 401 | 403) => {
            FailureType::NeedsAuth
        }
        DownloadError::HttpStatus { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Network { .. }
        | DownloadError::Decode { .. } => FailureType::Transient,
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::InvalidProxy { .. }
        | DownloadError::ClientBuild { .. } => FailureType::Permanent,
    }
}

/// Runs `operation` until it succeeds, fails non-retryably, or the policy's
/// attempt budget is spent.
///
/// `operation` receives the 1-indexed attempt number. `label` names the
/// operation in the per-attempt warning lines. The last error is returned
/// unchanged, so a credential rejection still reads as
/// [`DownloadError::AuthRequired`] to the caller.
///
/// # Errors
///
/// Returns the error from the final attempt.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(operation = label, attempt, "attempting request");

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => match policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry { delay, .. } => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "{label} attempt {attempt}/{} failed, retrying",
                        policy.max_attempts()
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(operation = label, attempt, %reason, "not retrying");
                    return Err(error);
                }
            },
        }
    }
}
