//! Counting admission gate shared by every transfer of one manager.
//!
//! Each transfer holds one permit while it talks to the mail servers, so at
//! most `capacity` imapsync processes run at once no matter how many job
//! tasks are spawned. Admission is FIFO; a waiter is never starved by later
//! arrivals.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TransferError, CANCELLED_WHILE_WAITING};

/// Counting semaphore with cancellable waits.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: u32,
    semaphore: Arc<Semaphore>,
}

/// Permits held by one caller. Releases them when dropped, exactly once.
#[derive(Debug)]
pub struct GatePermit {
    count: u32,
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Number of permits this guard holds.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Give the permits back now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl AdmissionGate {
    /// Create a gate with `capacity` permits (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize)) as u32;
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Free permits right now.
    pub fn available(&self) -> u32 {
        self.semaphore.available_permits() as u32
    }

    /// Permits currently held (capacity - available).
    pub fn in_use(&self) -> u32 {
        self.capacity.saturating_sub(self.available())
    }

    fn check_request(&self, n: u32) -> Result<()> {
        if n > self.capacity {
            return Err(TransferError::AdmissionDenied(format!(
                "{} permits requested, capacity {}",
                n, self.capacity
            )));
        }
        Ok(())
    }

    /// Wait until `n` permits are free and take them.
    ///
    /// Returns `AdmissionDenied` as soon as `cancel` fires, including when it
    /// had already fired before the call.
    pub async fn acquire(&self, n: u32, cancel: &CancellationToken) -> Result<GatePermit> {
        self.check_request(n)?;
        if cancel.is_cancelled() {
            return Err(TransferError::AdmissionDenied(CANCELLED_WHILE_WAITING.into()));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(TransferError::AdmissionDenied(CANCELLED_WHILE_WAITING.into()))
            }
            permit = Arc::clone(&self.semaphore).acquire_many_owned(n) => {
                let permit = permit
                    .map_err(|_| TransferError::AdmissionDenied("gate closed".into()))?;
                Ok(GatePermit { count: n, _permit: permit })
            }
        }
    }

    /// Take `n` permits if they are free right now, without waiting.
    pub fn try_acquire(&self, n: u32) -> Option<GatePermit> {
        if n > self.capacity {
            return None;
        }
        Arc::clone(&self.semaphore)
            .try_acquire_many_owned(n)
            .ok()
            .map(|permit| GatePermit {
                count: n,
                _permit: permit,
            })
    }
}
