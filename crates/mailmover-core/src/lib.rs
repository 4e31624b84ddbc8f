pub mod config;
pub mod logging;

pub mod cache;
pub mod error;
pub mod gate;
pub mod manager;
pub mod memory;
pub mod retry;
pub mod stats;
pub mod transfer;

pub use error::{Result, TransferError};
pub use manager::{
    Endpoint, Job, JobId, JobOutcome, JobStatus, JobSummary, NewJob, RunReport, Secret,
    TransferManager, TransferRecord,
};
