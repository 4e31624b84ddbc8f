//! The external transfer tool (imapsync) as seen by the manager.
//!
//! The manager only starts the tool, reads progress from its stdout, and
//! checks its exit status; `TransferRunner` is the seam so tests and other
//! tools can stand in for imapsync.

mod args;
mod progress;
mod runner;

pub use args::{job_tmp_dir, login_args, sync_args};
pub use progress::{parse_bytes_transferred, parse_progress, ESTIMATED_BYTES_PER_TRANSFER};
pub use runner::{ImapsyncRunner, ProgressFn, TransferRequest, TransferRunner};
