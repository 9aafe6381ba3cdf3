//! Bounded exponential-backoff retry around an arbitrary async unit of work.
//!
//! ```text
//! attempt 1 ── fail ──> sleep(base) ── attempt 2 ── fail ──> sleep(2·base) ── attempt 3 ...
//!     │                                    │
//!     └── ok ──> Success                   └── ok ──> Success
//!
//! attempt == max_attempts && fail ──> Failure { last_error, attempts_made: max_attempts }
//! ```
//!
//! The work is treated as at-least-once: it may run again after a failure that happened after a
//! partial side effect. Deduplication is the work's own responsibility.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};

/// How many times to try, and how long to wait before the first retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the first one (must be at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for every retry after that
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Result of running work under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome<T, E> {
    Success(T),
    Failure { last_error: E, attempts_made: u32 },
}

impl<T, E> ProcessingOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Success(_))
    }

    /// Attempts spent before giving up; `None` on success
    pub fn attempts_made(&self) -> Option<u32> {
        match self {
            ProcessingOutcome::Success(_) => None,
            ProcessingOutcome::Failure { attempts_made, .. } => Some(*attempts_made),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProcessingOutcome<U, E> {
        match self {
            ProcessingOutcome::Success(value) => ProcessingOutcome::Success(f(value)),
            ProcessingOutcome::Failure { last_error, attempts_made } => ProcessingOutcome::Failure { last_error, attempts_made },
        }
    }
}

/// Delay to wait after failed attempt `attempt` (1-indexed): `base_delay * 2^(attempt-1)`.
///
/// Saturates at [`Duration::MAX`] instead of overflowing.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    policy.base_delay.saturating_mul(factor)
}

/// Run `work` until it succeeds or the policy's attempt budget is spent.
///
/// Waits between attempts with `tokio::time::sleep`, so other tasks on the same worker keep
/// running. A `max_attempts` of 0 is treated as 1.
pub async fn run_with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut work: F) -> ProcessingOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.attempt_budget();
    let mut attempt = 1;

    loop {
        match work().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Work succeeded after retry");
                }
                return ProcessingOutcome::Success(value);
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(attempts = attempt, error = %error, "Work failed, retries exhausted");
                return ProcessingOutcome::Failure {
                    last_error: error,
                    attempts_made: attempt,
                };
            }
            Err(error) => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Work failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
