//! Retry loop: run an async operation until success, exhaustion, or cancellation.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::error::{Result, TransferError};

/// Runs `op` until it succeeds or the policy says to stop.
///
/// `op` receives the 1-based attempt number. Between attempts the loop sleeps
/// for the backoff delay; if `cancel` fires first it returns `Cancelled`
/// without another attempt. After the last failed attempt it returns
/// `RetryExhausted` wrapping that failure. Cancellation errors from `op`
/// itself are returned as-is, unwrapped.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let kind = ErrorKind::of(&err);
        if kind == ErrorKind::Cancelled {
            return Err(err);
        }
        tracing::warn!(attempt, max_attempts = policy.attempts(), "attempt failed: {}", err);

        match policy.decide(attempt, kind) {
            RetryDecision::NoRetry => {
                return Err(TransferError::RetryExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                })
            }
            RetryDecision::RetryAfter(delay) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
