//! Parallel transfer manager: job registry and dispatch.
//!
//! Owns the jobs and, per instance, the admission gate, retry policy,
//! result cache, statistics and cancellation token. `start_all_jobs` spawns
//! one task per pending job; the gate, not the runtime, bounds how many
//! talk to the mail servers at once.

mod execute;
mod job;

pub use job::{Endpoint, Job, JobId, JobStatus, JobSummary, NewJob, Secret, TransferRecord};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::cache::ExpiringCache;
use crate::config::MailmoverConfig;
use crate::error::{Result, TransferError};
use crate::gate::AdmissionGate;
use crate::memory;
use crate::retry::RetryPolicy;
use crate::stats::{StatsSnapshot, TransferStats};
use crate::transfer::TransferRunner;

use self::job::transfer_cache_key;

/// Per-job record behind its own lock; the registry map only holds handles.
type JobSlot = Arc<Mutex<Job>>;

fn lock_job(slot: &JobSlot) -> std::sync::MutexGuard<'_, Job> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Terminal state of one job launched by `start_all_jobs`.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub id: JobId,
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Result of one `start_all_jobs` run: every launched job, in launch order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Registry of transfer jobs plus the shared machinery to run them.
pub struct TransferManager {
    config: MailmoverConfig,
    retry_policy: RetryPolicy,
    runner: Arc<dyn TransferRunner>,
    jobs: RwLock<HashMap<JobId, JobSlot>>,
    gate: AdmissionGate,
    cache: Arc<ExpiringCache<String, TransferRecord>>,
    stats: TransferStats,
    cancel: CancellationToken,
    /// Serializes `start_all_jobs` so a pending job is never launched twice.
    run_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TransferManager {
    pub fn new(config: MailmoverConfig, runner: Arc<dyn TransferRunner>) -> Self {
        let retry_policy = RetryPolicy::from(&config.retry_config());
        Self {
            gate: AdmissionGate::new(config.max_concurrent_transfers),
            retry_policy,
            runner,
            jobs: RwLock::new(HashMap::new()),
            cache: Arc::new(ExpiringCache::new()),
            stats: TransferStats::new(),
            cancel: CancellationToken::new(),
            run_lock: tokio::sync::Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &MailmoverConfig {
        &self.config
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub(crate) fn runner(&self) -> &dyn TransferRunner {
        self.runner.as_ref()
    }

    pub(crate) fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// The registry-wide cancellation signal (fires on `cancel_all_jobs`).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a job as pending. Generates an id when none is given;
    /// an existing job with the same id is replaced.
    pub fn add_job(&self, new_job: NewJob) -> JobId {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let id = match new_job.id {
            Some(id) => id,
            None => generate_id(&jobs),
        };
        tracing::info!(
            job_id = %id,
            source = %new_job.source.account,
            destination = %new_job.destination.account,
            "added transfer job"
        );
        let job = Job::pending(id.clone(), new_job.source, new_job.destination);
        if jobs.insert(id.clone(), Arc::new(Mutex::new(job))).is_some() {
            tracing::debug!(job_id = %id, "replaced existing job with the same id");
        }
        id
    }

    /// Copy of one job.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        let slot = self.slot(id)?;
        let job = lock_job(&slot).clone();
        Some(job)
    }

    /// Copies of all jobs, sorted by id.
    pub fn get_all_jobs(&self) -> Vec<Job> {
        let mut all: Vec<Job> = self
            .slots()
            .into_iter()
            .map(|(_, slot)| lock_job(&slot).clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Count of jobs per status.
    pub fn job_summary(&self) -> JobSummary {
        let mut summary = JobSummary::default();
        for (_, slot) in self.slots() {
            summary.add(lock_job(&slot).status);
        }
        summary
    }

    /// Mark a running job as cancelled.
    ///
    /// Advisory: the job's task keeps going until it finishes or the
    /// registry-wide signal fires, but its final status stays `cancelled`.
    /// Jobs in any other state are left alone.
    pub fn cancel_job(&self, id: &JobId) -> Result<()> {
        let slot = self
            .slot(id)
            .ok_or_else(|| TransferError::NotFound(id.clone()))?;
        let mut job = lock_job(&slot);
        if job.status == JobStatus::Running {
            job.status = JobStatus::Cancelled;
            tracing::info!(job_id = %id, "cancelled job");
        }
        Ok(())
    }

    /// Fire the registry-wide cancellation signal and mark running jobs cancelled.
    ///
    /// Irreversible: every later gate wait and backoff fails fast. Pending
    /// jobs stay pending.
    pub fn cancel_all_jobs(&self) {
        self.cancel.cancel();
        let mut cancelled = 0usize;
        for (_, slot) in self.slots() {
            let mut job = lock_job(&slot);
            if job.status == JobStatus::Running {
                job.status = JobStatus::Cancelled;
                cancelled += 1;
            }
        }
        tracing::info!(cancelled, "cancelled all running jobs");
    }

    /// Run every job that is pending right now and wait for all of them.
    ///
    /// Jobs added while the run is in progress wait for the next call. A
    /// failed or panicked job never aborts the others.
    pub async fn start_all_jobs(self: &Arc<Self>) -> RunReport {
        let _run = self.run_lock.lock().await;
        self.optimize_memory();

        let pending: Vec<(JobId, JobSlot)> = self
            .slots()
            .into_iter()
            .filter(|(_, slot)| lock_job(slot).status == JobStatus::Pending)
            .collect();
        tracing::info!(count = pending.len(), "starting transfer jobs in parallel");

        let mut handles = Vec::with_capacity(pending.len());
        for (id, slot) in pending {
            let manager = Arc::clone(self);
            let task_slot = Arc::clone(&slot);
            let handle = tokio::spawn(async move {
                execute::execute_job(&manager, &task_slot).await;
            });
            handles.push((id, slot, handle));
        }

        let mut report = RunReport::default();
        for (id, slot, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(job_id = %id, "job task ended abnormally: {}", e);
                self.record_abnormal_end(&slot, format!("job task ended abnormally: {}", e));
            }
            let job = lock_job(&slot);
            report.outcomes.push(JobOutcome {
                id,
                status: job.status,
                error: job.error.clone(),
            });
        }

        tracing::info!(
            completed = report.count(JobStatus::Completed),
            failed = report.count(JobStatus::Failed),
            cancelled = report.count(JobStatus::Cancelled),
            "all transfer jobs finished"
        );
        report
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Transfers currently holding a gate permit.
    pub fn active_transfers(&self) -> u32 {
        self.gate.in_use()
    }

    pub fn max_concurrent_transfers(&self) -> u32 {
        self.gate.capacity()
    }

    /// Last successful transfer between these endpoints, if still cached.
    pub fn cached_transfer(&self, source: &Endpoint, destination: &Endpoint) -> Option<TransferRecord> {
        self.cache.get(&transfer_cache_key(source, destination))
    }

    pub fn invalidate_cached_transfer(&self, source: &Endpoint, destination: &Endpoint) {
        self.cache.delete(&transfer_cache_key(source, destination));
    }

    pub fn clear_cache(&self) {
        self.cache.flush();
    }

    pub fn cache_item_count(&self) -> usize {
        self.cache.item_count()
    }

    /// Start the periodic cache sweep; it stops when the registry is cancelled.
    pub fn spawn_cache_cleanup(&self) -> tokio::task::JoinHandle<()> {
        Arc::clone(&self.cache).spawn_cleanup(self.config.cache_cleanup_interval(), self.cancel.clone())
    }

    /// Flush the cache when resident memory is above the configured ceiling.
    /// Returns true if the cache was flushed.
    pub fn optimize_memory(&self) -> bool {
        if !memory::above_limit(self.config.memory_limit_mb) {
            return false;
        }
        tracing::info!(
            limit_mb = self.config.memory_limit_mb,
            "memory usage high, clearing cache"
        );
        self.clear_cache();
        true
    }

    pub(crate) fn remember_transfer(&self, job: &Job) {
        let Some(finished_at) = job.finished_at else {
            return;
        };
        let record = TransferRecord {
            finished_at,
            duration: job.duration().unwrap_or_default(),
            bytes: job.bytes_transferred,
        };
        self.cache.set(
            transfer_cache_key(&job.source, &job.destination),
            record,
            self.config.cache_ttl(),
        );
    }

    pub(crate) fn record_outcome(&self, success: bool, bytes: u64) {
        self.stats.update(success, bytes);
    }

    fn record_abnormal_end(&self, slot: &JobSlot, message: String) {
        let mut job = lock_job(slot);
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return;
        }
        if job.status != JobStatus::Cancelled {
            job.status = JobStatus::Failed;
        }
        job.error = Some(message);
        job.finished_at = Some(SystemTime::now());
        drop(job);
        self.stats.update(false, 0);
    }

    fn slot(&self, id: &JobId) -> Option<JobSlot> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn slots(&self) -> Vec<(JobId, JobSlot)> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }
}

/// `job_<unix-nanos>`, bumped until unused.
fn generate_id(jobs: &HashMap<JobId, JobSlot>) -> JobId {
    let mut nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    loop {
        let id = JobId::new(format!("job_{}", nanos));
        if !jobs.contains_key(&id) {
            return id;
        }
        nanos += 1;
    }
}
