//! Shared helpers for manager integration tests: scripted transfer runners.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailmover_core::config::{MailmoverConfig, RetryConfig};
use mailmover_core::transfer::{ProgressFn, TransferRequest, TransferRunner};
use mailmover_core::{Endpoint, NewJob, Secret, TransferError};
use tokio_util::sync::CancellationToken;

pub fn config(capacity: usize, attempts: u32, base_delay_secs: f64) -> MailmoverConfig {
    MailmoverConfig {
        max_concurrent_transfers: capacity,
        retry: Some(RetryConfig {
            attempts,
            base_delay_secs,
        }),
        ..MailmoverConfig::default()
    }
}

pub fn job(n: u32) -> NewJob {
    NewJob::new(
        Endpoint::new("imap.old.example", format!("u{n}@old.example"), Secret::new("pw1")),
        Endpoint::new("imap.new.example", format!("u{n}@new.example"), Secret::new("pw2")),
    )
}

/// Counts calls and tracks how many runs overlap.
#[derive(Default)]
pub struct Probe {
    pub calls: AtomicU32,
    pub in_flight: AtomicU32,
    pub peak: AtomicU32,
}

impl Probe {
    pub fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Succeeds after `hold`, reporting 50% then returning `bytes`.
pub struct SucceedingRunner {
    pub probe: Arc<Probe>,
    pub hold: Duration,
    pub bytes: u64,
}

#[async_trait]
impl TransferRunner for SucceedingRunner {
    async fn run(
        &self,
        _request: TransferRequest<'_>,
        progress: ProgressFn<'_>,
        _cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        self.probe.enter();
        progress(50.0);
        tokio::time::sleep(self.hold).await;
        self.probe.leave();
        Ok(self.bytes)
    }
}

/// Fails every attempt before `succeed_on`, then succeeds. `succeed_on = 0` never succeeds.
pub struct FlakyRunner {
    pub probe: Arc<Probe>,
    pub succeed_on: u32,
}

#[async_trait]
impl TransferRunner for FlakyRunner {
    async fn run(
        &self,
        request: TransferRequest<'_>,
        _progress: ProgressFn<'_>,
        _cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        self.probe.enter();
        self.probe.leave();
        if self.succeed_on != 0 && request.attempt >= self.succeed_on {
            Ok(2048)
        } else {
            Err(TransferError::operation(format!(
                "attempt {} refused",
                request.attempt
            )))
        }
    }
}

/// Runs until the cancellation signal fires, like a long imapsync session.
pub struct BlockingRunner {
    pub probe: Arc<Probe>,
}

#[async_trait]
impl TransferRunner for BlockingRunner {
    async fn run(
        &self,
        _request: TransferRequest<'_>,
        progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        self.probe.enter();
        progress(10.0);
        cancel.cancelled().await;
        self.probe.leave();
        Err(TransferError::Cancelled)
    }
}

/// Panics for jobs whose source account starts with "boom", succeeds otherwise.
pub struct PanickingRunner;

#[async_trait]
impl TransferRunner for PanickingRunner {
    async fn run(
        &self,
        request: TransferRequest<'_>,
        _progress: ProgressFn<'_>,
        _cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        if request.source.account.starts_with("boom") {
            panic!("runner exploded");
        }
        Ok(1)
    }
}

/// Poll `cond` every few ms until it holds or `within` elapses.
pub async fn wait_until(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cond()
}
