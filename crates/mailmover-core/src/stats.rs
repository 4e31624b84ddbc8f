//! Aggregate transfer statistics (counts, bytes, throughput).
//!
//! One `TransferStats` per manager. All counters sit behind a single mutex
//! so a snapshot never shows a total that disagrees with its parts.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// Consistent copy of the aggregate counters.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub total_transfers: u64,
    pub successful_transfers: u64,
    pub failed_transfers: u64,
    /// Estimated bytes moved by successful transfers.
    pub total_bytes: u64,
    /// Bytes per second since the aggregator started (0 until a transfer completes).
    pub average_speed: f64,
    pub started_at: Instant,
    pub last_transfer_at: Option<SystemTime>,
}

impl StatsSnapshot {
    /// Share of successful transfers in percent (None before the first transfer).
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_transfers == 0 {
            return None;
        }
        Some(self.successful_transfers as f64 / self.total_transfers as f64 * 100.0)
    }

    /// Time since the aggregator started (or was last reset).
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug)]
struct StatsInner {
    total_transfers: u64,
    successful_transfers: u64,
    failed_transfers: u64,
    total_bytes: u64,
    average_speed: f64,
    started_at: Instant,
    last_transfer_at: Option<SystemTime>,
}

impl StatsInner {
    fn fresh() -> Self {
        Self {
            total_transfers: 0,
            successful_transfers: 0,
            failed_transfers: 0,
            total_bytes: 0,
            average_speed: 0.0,
            started_at: Instant::now(),
            last_transfer_at: None,
        }
    }
}

/// Thread-safe aggregator fed by every finished job.
#[derive(Debug)]
pub struct TransferStats {
    inner: Mutex<StatsInner>,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self {
            inner: Mutex::new(StatsInner::fresh()),
        }
    }
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished operation.
    pub fn update(&self, success: bool, bytes: u64) {
        let mut s = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        s.total_transfers += 1;
        if success {
            s.successful_transfers += 1;
        } else {
            s.failed_transfers += 1;
        }
        s.total_bytes = s.total_bytes.saturating_add(bytes);
        s.last_transfer_at = Some(SystemTime::now());

        let elapsed = s.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            s.average_speed = s.total_bytes as f64 / elapsed;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let s = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        StatsSnapshot {
            total_transfers: s.total_transfers,
            successful_transfers: s.successful_transfers,
            failed_transfers: s.failed_transfers,
            total_bytes: s.total_bytes,
            average_speed: s.average_speed,
            started_at: s.started_at,
            last_transfer_at: s.last_transfer_at,
        }
    }

    /// Zero all counters and restart the clock.
    pub fn reset(&self) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = StatsInner::fresh();
    }
}
