//! Retry policy for transport timeouts.
//!
//! Only timeouts are retried, with a fixed delay between attempts. Every other
//! transport failure is terminal for the request and downgrades to a soft
//! network error in the executor.

use std::time::Duration;

use crate::http_client::HttpError;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop and report the failure.
    NoRetry,
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
}

/// Fixed-delay retry policy applied per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay between a timed-out attempt and the next one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Disable retries: a single attempt per request.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Decide what to do after `attempt` (1-based) failed with `error`.
    pub fn decide(&self, attempt: u32, error: &HttpError) -> RetryDecision {
        if !error.retryable() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_retry_with_fixed_delay() {
        let policy = RetryPolicy::default();
        let timeout = HttpError::timeout("read timed out");

        assert_eq!(
            policy.decide(1, &timeout),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(4, &timeout),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
    }

    #[test]
    fn stops_at_max_attempts() {
        let policy = RetryPolicy::default();
        let timeout = HttpError::timeout("read timed out");

        assert_eq!(policy.decide(5, &timeout), RetryDecision::NoRetry);
        assert_eq!(policy.decide(6, &timeout), RetryDecision::NoRetry);
    }

    #[test]
    fn connection_failures_are_never_retried() {
        let policy = RetryPolicy::default();
        let reset = HttpError::connect("connection reset by peer");

        assert_eq!(policy.decide(1, &reset), RetryDecision::NoRetry);
    }

    #[test]
    fn no_retry_allows_a_single_attempt() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(
            policy.decide(1, &HttpError::timeout("slow")),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
