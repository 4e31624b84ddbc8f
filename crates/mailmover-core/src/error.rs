//! Error types for the transfer core.

use thiserror::Error;

use crate::manager::JobId;

/// Errors surfaced by the admission gate, retry policy, runner and registry.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Gate acquisition aborted (cancellation fired, or more permits were
    /// requested than the gate will ever hold).
    #[error("admission denied: {0}")]
    AdmissionDenied(String),

    /// A single attempt of the external operation failed.
    #[error("operation failed: {message}")]
    OperationFailed { message: String },

    /// Every configured attempt failed; wraps the last failure.
    #[error("operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<TransferError>,
    },

    /// Cancellation signal observed while waiting or while the tool ran.
    #[error("transfer cancelled")]
    Cancelled,

    /// No job with this id in the registry.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// Subprocess plumbing (spawn, pipe, wait).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Create an OperationFailed error
    pub fn operation(message: impl Into<String>) -> Self {
        TransferError::OperationFailed {
            message: message.into(),
        }
    }

    /// True when this error (or the failure it wraps) came from the
    /// cancellation signal rather than from the operation itself.
    pub fn is_cancellation(&self) -> bool {
        match self {
            TransferError::Cancelled => true,
            TransferError::AdmissionDenied(reason) => reason == CANCELLED_WHILE_WAITING,
            TransferError::RetryExhausted { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }
}

/// Reason attached to `AdmissionDenied` when the wait was cut by cancellation.
pub(crate) const CANCELLED_WHILE_WAITING: &str = "cancelled while waiting for a permit";

/// Result alias for the transfer core.
pub type Result<T> = std::result::Result<T, TransferError>;
