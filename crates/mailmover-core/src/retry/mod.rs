//! Retry and backoff policy.
//!
//! Every transfer attempt runs under the same bounded, linearly backed-off
//! policy. Backoff sleeps race the manager's cancellation token so a
//! cancelled batch never sits out a delay.

mod policy;
mod run;

pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
