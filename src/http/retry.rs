//! Retry policy for transport failures.
//!
//! Only failures to obtain a response are retried. A response with any status
//! code, 4xx and 5xx included, ends the attempt loop.

use std::time::Duration;

use crate::error::error_chain;

/// Delay before the first retry when none is configured.
pub const DEFAULT_MIN_DELAY_MS: u64 = 1000;

/// Upper bound for the exponential backoff when none is configured.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// How many extra attempts to make after the first, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            min_delay: Duration::from_millis(DEFAULT_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Total attempts permitted, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Wait before retry number `retry` (0-based): `min_delay * 2^retry`, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry);
        self.min_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

/// Attempt bookkeeping for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempts_made: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts_made: 0,
            max_attempts: policy.max_attempts(),
        }
    }

    /// Records the start of an attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts_made += 1;
        self.attempts_made
    }

    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.max_attempts
    }
}

/// Transport-level failures are retryable; malformed requests and redirect
/// policy violations are not.
pub fn is_retryable(error: &reqwest::Error) -> bool {
    !(error.is_builder() || error.is_redirect() || error.is_status())
}

/// Per-attempt annotation of a retryable transport error.
pub fn annotate(error: &reqwest::Error) -> String {
    format!("retrying as request generated error: {}", error_chain(error))
}

/// Final message once no further attempt will be made.
pub fn give_up(url: &str, attempts: u32, cause: &str) -> String {
    format!(
        "GET {} giving up after {} attempt(s): {}",
        url, attempts, cause
    )
}
