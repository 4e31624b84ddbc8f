//! Execute one job: admission → transfer under retry → terminal state.

use std::time::SystemTime;

use crate::error::{Result, TransferError};
use crate::retry::run_with_retry;
use crate::transfer::TransferRequest;

use super::{lock_job, JobSlot, JobStatus, TransferManager};

/// Runs one pending job to a terminal state.
///
/// The gate permit is bound to this scope and released on every exit path,
/// including a panic inside the runner.
pub(super) async fn execute_job(manager: &TransferManager, slot: &JobSlot) {
    let (id, source, destination) = {
        let job = lock_job(slot);
        (job.id.clone(), job.source.clone(), job.destination.clone())
    };
    let cancel = manager.cancellation_token();

    let _permit = match manager.gate().acquire(1, &cancel).await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!(job_id = %id, "could not acquire transfer slot: {}", e);
            finish_job(manager, slot, Err(e));
            return;
        }
    };

    if !mark_running(slot) {
        tracing::debug!(job_id = %id, "job left pending state before it could start");
        return;
    }
    tracing::info!(job_id = %id, status = %JobStatus::Running, "job status changed");

    let progress = |p: f64| set_progress(slot, p);
    let outcome = run_with_retry(manager.retry_policy(), &cancel, |attempt| {
        let request = TransferRequest {
            job_id: &id,
            source: &source,
            destination: &destination,
            attempt,
        };
        let progress = &progress;
        let cancel = &cancel;
        async move { manager.runner().run(request, progress, cancel).await }
    })
    .await;

    finish_job(manager, slot, outcome);
}

/// pending → running, stamping the start time. False if the job is not pending.
fn mark_running(slot: &JobSlot) -> bool {
    let mut job = lock_job(slot);
    if job.status != JobStatus::Pending {
        return false;
    }
    job.status = JobStatus::Running;
    job.started_at = Some(SystemTime::now());
    job.progress = 0.0;
    job.error = None;
    true
}

fn set_progress(slot: &JobSlot, progress: f64) {
    let mut job = lock_job(slot);
    if job.status == JobStatus::Running {
        job.progress = progress.clamp(0.0, 100.0);
    }
}

/// Apply the terminal outcome, feed statistics, and cache a success.
///
/// Any cancellation error, or a job already marked cancelled by
/// `cancel_job`/`cancel_all_jobs`, ends as `cancelled`. A job that is
/// already completed or failed is not touched again.
fn finish_job(manager: &TransferManager, slot: &JobSlot, outcome: Result<u64>) {
    let finished = {
        let mut job = lock_job(slot);
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return;
        }
        let already_cancelled = job.status == JobStatus::Cancelled;
        job.finished_at = Some(SystemTime::now());

        match outcome {
            Ok(bytes) if !already_cancelled => {
                job.status = JobStatus::Completed;
                job.progress = 100.0;
                job.bytes_transferred = bytes;
                job.error = None;
            }
            Ok(_) => {
                job.error = Some(TransferError::Cancelled.to_string());
            }
            Err(e) => {
                job.status = if already_cancelled || e.is_cancellation() {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Failed
                };
                job.error = Some(e.to_string());
            }
        }
        job.clone()
    };

    match finished.status {
        JobStatus::Completed => {
            tracing::info!(
                job_id = %finished.id,
                bytes = finished.bytes_transferred,
                "job status changed: completed"
            );
            manager.record_outcome(true, finished.bytes_transferred);
            manager.remember_transfer(&finished);
        }
        status => {
            tracing::error!(
                job_id = %finished.id,
                %status,
                error = finished.error.as_deref().unwrap_or(""),
                "job did not complete"
            );
            manager.record_outcome(false, 0);
        }
    }
}
