//! Running the transfer tool as a subprocess.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::args::{job_tmp_dir, login_args, sync_args};
use super::progress::{parse_bytes_transferred, parse_progress, ESTIMATED_BYTES_PER_TRANSFER};
use crate::config::ToolConfig;
use crate::error::{Result, TransferError};
use crate::manager::{Endpoint, JobId};

/// Callback receiving progress percentages in [0, 100].
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// One attempt of one job, as handed to a runner.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub job_id: &'a JobId,
    pub source: &'a Endpoint,
    pub destination: &'a Endpoint,
    /// 1-based attempt number within the current retry loop.
    pub attempt: u32,
}

/// Performs a single transfer attempt.
///
/// Implementations must observe `cancel` and return `TransferError::Cancelled`
/// promptly once it fires. On success they return the (estimated) number of
/// bytes moved.
#[async_trait]
pub trait TransferRunner: Send + Sync {
    async fn run(
        &self,
        request: TransferRequest<'_>,
        progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

/// Runs imapsync (or a compatible program) and streams its progress.
#[derive(Debug, Clone)]
pub struct ImapsyncRunner {
    tool: ToolConfig,
}

impl ImapsyncRunner {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    fn command(&self, args: Vec<String>) -> Command {
        let mut cmd = Command::new(&self.tool.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child> {
        cmd.spawn().map_err(|e| {
            TransferError::operation(format!("failed to start {}: {}", self.tool.program, e))
        })
    }

    /// Wait for exit, killing the child if `cancel` fires first.
    async fn wait(&self, child: &mut Child, cancel: &CancellationToken) -> Result<()> {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                kill(child).await;
                return Err(TransferError::Cancelled);
            }
            status = child.wait() => status?,
        };
        if !status.success() {
            return Err(TransferError::operation(format!(
                "{} exited with {}",
                self.tool.program, status
            )));
        }
        Ok(())
    }

    /// Log in to both servers without transferring anything.
    pub async fn check_login(
        &self,
        source: &Endpoint,
        destination: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut cmd = self.command(login_args(source, destination));
        cmd.stdout(Stdio::null());
        let mut child = self.spawn(cmd)?;
        self.wait(&mut child, cancel).await
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!("kill transfer process: {}", e);
    }
}

#[async_trait]
impl TransferRunner for ImapsyncRunner {
    async fn run(
        &self,
        request: TransferRequest<'_>,
        progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let tmp_dir = job_tmp_dir(&self.tool, request.job_id);
        tokio::fs::create_dir_all(&tmp_dir).await?;

        let args = sync_args(
            &self.tool,
            request.job_id,
            request.source,
            request.destination,
        );
        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped());
        let mut child = self.spawn(cmd)?;
        tracing::debug!(
            job_id = %request.job_id,
            attempt = request.attempt,
            program = %self.tool.program,
            "transfer process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransferError::operation("failed to capture stdout"))?;
        // Output may carry raw 8-bit folder names; decode lossily.
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut reported_bytes = None;

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    kill(&mut child).await;
                    return Err(TransferError::Cancelled);
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };
            match read {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Some(p) = parse_progress(&line) {
                        progress(p);
                    }
                    if let Some(b) = parse_bytes_transferred(&line) {
                        reported_bytes = Some(b);
                    }
                }
                Err(e) => {
                    kill(&mut child).await;
                    return Err(TransferError::operation(format!(
                        "reading {} output: {}",
                        self.tool.program, e
                    )));
                }
            }
        }

        self.wait(&mut child, cancel).await?;
        Ok(reported_bytes.unwrap_or(ESTIMATED_BYTES_PER_TRANSFER))
    }
}
