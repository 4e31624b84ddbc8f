//! Job records owned by the transfer manager.

use std::fmt;
use std::time::{Duration, SystemTime};

/// Opaque job identifier. Generated as `job_<unix-nanos>` when the caller
/// does not supply one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A password held only in memory. Never printed: Debug and Display show `***`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw value, for handing to the transfer tool only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// One side of a transfer: IMAP host, account and its password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub account: String,
    pub password: Secret,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, account: impl Into<String>, password: Secret) -> Self {
        Self {
            host: host.into(),
            account: account.into(),
            password,
        }
    }
}

/// Lifecycle state of a job. `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Input to `TransferManager::add_job`.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Caller-chosen id; generated when `None`. Reusing an id replaces the old job.
    pub id: Option<JobId>,
    pub source: Endpoint,
    pub destination: Endpoint,
}

impl NewJob {
    pub fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            id: None,
            source,
            destination,
        }
    }

    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Job record. Observers only ever see clones of it.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub status: JobStatus,
    /// Percentage in [0, 100].
    pub progress: f64,
    pub error: Option<String>,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    /// Estimated bytes moved (set on completion).
    pub bytes_transferred: u64,
}

impl Job {
    pub(crate) fn pending(id: JobId, source: Endpoint, destination: Endpoint) -> Self {
        Self {
            id,
            source,
            destination,
            status: JobStatus::Pending,
            progress: 0.0,
            error: None,
            started_at: None,
            finished_at: None,
            bytes_transferred: 0,
        }
    }

    /// Wall time between start and end, once both are known.
    pub fn duration(&self) -> Option<Duration> {
        let start = self.started_at?;
        let end = self.finished_at?;
        end.duration_since(start).ok()
    }
}

/// Number of jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobSummary {
    pub(crate) fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }

    pub fn total(&self) -> usize {
        JobStatus::ALL.iter().map(|&status| self.get(status)).sum()
    }
}

/// What the cache remembers about a successful transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub finished_at: SystemTime,
    pub duration: Duration,
    pub bytes: u64,
}

/// Cache key for a source/destination pair.
pub(crate) fn transfer_cache_key(source: &Endpoint, destination: &Endpoint) -> String {
    format!("{}_{}_{}", source.account, destination.account, source.host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str, account: &str) -> Endpoint {
        Endpoint::new(host, account, Secret::new("hunter2"))
    }

    #[test]
    fn secrets_never_print() {
        let ep = endpoint("imap.example.com", "alice@example.com");
        let dbg = format!("{:?}", ep);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("***"));
        assert_eq!(ep.password.to_string(), "***");
        assert_eq!(ep.password.expose(), "hunter2");
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn summary_total_matches_additions() {
        let mut s = JobSummary::default();
        for status in JobStatus::ALL {
            s.add(status);
        }
        s.add(JobStatus::Completed);
        assert_eq!(s.total(), 6);
        assert_eq!(s.get(JobStatus::Completed), 2);
    }

    #[test]
    fn cache_key_joins_accounts_and_source_host() {
        let key = transfer_cache_key(
            &endpoint("imap.old.example", "a@old.example"),
            &endpoint("imap.new.example", "a@new.example"),
        );
        assert_eq!(key, "a@old.example_a@new.example_imap.old.example");
    }

    #[test]
    fn duration_needs_both_timestamps() {
        let mut job = Job::pending(
            JobId::from("job_1"),
            endpoint("h1", "a"),
            endpoint("h2", "b"),
        );
        assert!(job.duration().is_none());
        let start = SystemTime::now();
        job.started_at = Some(start);
        job.finished_at = Some(start + Duration::from_secs(3));
        assert_eq!(job.duration(), Some(Duration::from_secs(3)));
    }
}
