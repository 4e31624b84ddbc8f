//! `mailmover check` – verify credentials for every job in a manifest.

use anyhow::{bail, Result};
use mailmover_core::config::MailmoverConfig;
use mailmover_core::gate::AdmissionGate;
use mailmover_core::retry::{run_with_retry, RetryPolicy};
use mailmover_core::transfer::ImapsyncRunner;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::manifest::load_manifest;

pub async fn run_check(cfg: &MailmoverConfig, manifest_path: &Path) -> Result<()> {
    let jobs = load_manifest(manifest_path)?.into_jobs()?;
    let runner = Arc::new(ImapsyncRunner::new(cfg.tool_config()));
    let policy = Arc::new(RetryPolicy::from(&cfg.retry_config()));
    let gate = Arc::new(AdmissionGate::new(cfg.max_concurrent_transfers));
    let cancel = CancellationToken::new();

    let interrupt_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut handles = Vec::with_capacity(jobs.len());
    for (i, job) in jobs.into_iter().enumerate() {
        let label = job
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("#{}", i + 1));
        let runner = Arc::clone(&runner);
        let policy = Arc::clone(&policy);
        let gate = Arc::clone(&gate);
        let cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let _permit = gate.acquire(1, &cancel).await?;
            run_with_retry(&policy, &cancel, |_| {
                runner.check_login(&job.source, &job.destination, &cancel)
            })
            .await
        });
        handles.push((label, handle));
    }

    let mut failures = 0usize;
    for (label, handle) in handles {
        match handle.await {
            Ok(Ok(())) => println!("{:<24} ok", label),
            Ok(Err(e)) => {
                failures += 1;
                println!("{:<24} FAILED  {}", label, e);
            }
            Err(e) => {
                failures += 1;
                println!("{:<24} FAILED  {}", label, e);
            }
        }
    }
    interrupt_handle.abort();

    if failures > 0 {
        bail!("{} of the manifest's logins failed", failures);
    }
    Ok(())
}
