use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::TransferError;

/// Classification of a failed attempt for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The attempt itself failed (non-zero exit, pipe error, ...). Retried.
    Transient,
    /// The cancellation signal fired. Never retried.
    Cancelled,
}

impl ErrorKind {
    pub fn of(err: &TransferError) -> Self {
        if err.is_cancellation() {
            ErrorKind::Cancelled
        } else {
            ErrorKind::Transient
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded retries with linear backoff: attempt n waits `base_delay * n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first). Always at least 1.
    attempts: u32,
    /// Delay unit for backoff.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self::new(cfg.attempts, cfg.base_delay())
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decide what to do after `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if kind == ErrorKind::Cancelled || attempt >= self.attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_in_attempt_number() {
        let p = RetryPolicy::new(4, Duration::from_secs(5));
        assert_eq!(
            p.decide(1, ErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(5))
        );
        assert_eq!(
            p.decide(2, ErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(10))
        );
        assert_eq!(
            p.decide(3, ErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(15))
        );
    }

    #[test]
    fn respects_attempt_count() {
        let p = RetryPolicy::new(3, Duration::from_millis(1));
        assert!(matches!(
            p.decide(2, ErrorKind::Transient),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(3, ErrorKind::Transient), RetryDecision::NoRetry);
    }

    #[test]
    fn never_retries_cancellation() {
        let p = RetryPolicy::new(10, Duration::from_millis(1));
        assert_eq!(p.decide(1, ErrorKind::Cancelled), RetryDecision::NoRetry);
        assert_eq!(ErrorKind::of(&TransferError::Cancelled), ErrorKind::Cancelled);
        assert_eq!(
            ErrorKind::of(&TransferError::operation("exit 1")),
            ErrorKind::Transient
        );
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let p = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(p.attempts(), 1);
        assert_eq!(p.decide(1, ErrorKind::Transient), RetryDecision::NoRetry);
    }

    #[test]
    fn built_from_config_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempts(), 3);
        assert_eq!(p.base_delay(), Duration::from_secs(5));
    }
}
