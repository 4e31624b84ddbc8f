//! `mailmover run` – transfer every mailbox in a manifest.

use anyhow::{bail, Result};
use mailmover_core::config::MailmoverConfig;
use mailmover_core::memory;
use mailmover_core::transfer::ImapsyncRunner;
use mailmover_core::{Job, JobStatus, NewJob, TransferManager, TransferRecord};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::manifest::load_manifest;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run_transfers(cfg: &MailmoverConfig, manifest_path: &Path) -> Result<()> {
    let jobs = load_manifest(manifest_path)?.into_jobs()?;
    let runner = Arc::new(ImapsyncRunner::new(cfg.tool_config()));
    let manager = Arc::new(TransferManager::new(cfg.clone(), runner));
    for job in jobs {
        if let Some(line) = cached_transfer_line(&manager, &job) {
            println!("{}", line);
        }
        manager.add_job(job);
    }
    println!(
        "Transferring {} mailbox(es), {} at a time.",
        manager.job_summary().total(),
        manager.max_concurrent_transfers()
    );

    let cleanup_handle = manager.spawn_cache_cleanup();

    let interrupt_handle = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, cancelling transfers...");
                manager.cancel_all_jobs();
            }
        })
    };

    let status_handle = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATUS_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let s = manager.job_summary();
                println!(
                    "  running {}  pending {}  completed {}  failed {}  cancelled {}",
                    s.running, s.pending, s.completed, s.failed, s.cancelled
                );
            }
        })
    };

    let report = manager.start_all_jobs().await;

    status_handle.abort();
    interrupt_handle.abort();
    cleanup_handle.abort();

    println!();
    print_jobs(&manager.get_all_jobs());
    println!();
    print_stats(&manager);

    let failed = report.count(JobStatus::Failed);
    let cancelled = report.count(JobStatus::Cancelled);
    if failed > 0 || cancelled > 0 {
        bail!("{} transfer(s) failed, {} cancelled", failed, cancelled);
    }
    Ok(())
}

fn print_jobs(jobs: &[Job]) {
    println!(
        "{:<24} {:<10} {:>10} {:>8}  {}",
        "ID", "STATUS", "MIB", "SECS", "SOURCE -> DESTINATION"
    );
    for j in jobs {
        let secs = j
            .duration()
            .map(|d| format!("{:.1}", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<10} {:>10.2} {:>8}  {} -> {}",
            j.id,
            j.status,
            mib(j.bytes_transferred),
            secs,
            j.source.account,
            j.destination.account
        );
        if let Some(err) = &j.error {
            println!("{:<24} {}", "", err);
        }
    }
}

fn print_stats(manager: &TransferManager) {
    let stats = manager.stats();
    let rate = stats
        .success_rate()
        .map(|r| format!("{:.1}%", r))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Transfers: {} total, {} ok, {} failed ({} success)",
        stats.total_transfers, stats.successful_transfers, stats.failed_transfers, rate
    );
    println!(
        "Volume: {:.2} MiB, {:.2} MiB/s average over {:.0}s",
        mib(stats.total_bytes),
        stats.average_speed / 1_048_576.0,
        stats.uptime().as_secs_f64()
    );
    let memory = memory::resident_mb()
        .map(|mb| format!("{:.1} MiB", mb))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Cache: {} item(s)  Active transfers: {}/{}  Memory: {}",
        manager.cache_item_count(),
        manager.active_transfers(),
        manager.max_concurrent_transfers(),
        memory
    );
}

/// Report the last successful transfer of this mailbox pair, if still cached.
fn cached_transfer_line(manager: &TransferManager, job: &NewJob) -> Option<String> {
    let record = manager.cached_transfer(&job.source, &job.destination)?;
    Some(format_cached_transfer(job, &record))
}

fn format_cached_transfer(job: &NewJob, record: &TransferRecord) -> String {
    let ago = record
        .finished_at
        .elapsed()
        .map(|d| format!("{}s ago", d.as_secs()))
        .unwrap_or_else(|_| "just now".to_string());
    format!(
        "Found cached transfer data for {} -> {}: {:.2} MiB in {:.1}s, finished {}",
        job.source.account,
        job.destination.account,
        mib(record.bytes),
        record.duration.as_secs_f64(),
        ago
    )
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}
