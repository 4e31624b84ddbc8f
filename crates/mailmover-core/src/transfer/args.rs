//! Argument vectors for imapsync.

use std::path::PathBuf;

use crate::config::ToolConfig;
use crate::manager::{Endpoint, JobId};

/// Per-job scratch directory: `<tmp_root>/tmp_<id>`.
pub fn job_tmp_dir(tool: &ToolConfig, job_id: &JobId) -> PathBuf {
    tool.tmp_root.join(format!("tmp_{}", job_id))
}

fn endpoint_args(args: &mut Vec<String>, source: &Endpoint, destination: &Endpoint) {
    for (n, ep) in [("1", source), ("2", destination)] {
        args.push(format!("--host{n}"));
        args.push(ep.host.clone());
        args.push(format!("--ssl{n}"));
        args.push(format!("--user{n}"));
        args.push(ep.account.clone());
        args.push(format!("--password{n}"));
        args.push(ep.password.expose().to_string());
    }
}

/// Full mailbox sync with progress output.
pub fn sync_args(
    tool: &ToolConfig,
    job_id: &JobId,
    source: &Endpoint,
    destination: &Endpoint,
) -> Vec<String> {
    let mut args = Vec::with_capacity(32);
    endpoint_args(&mut args, source, destination);
    for rule in &tool.excludes {
        args.push("--exclude".to_string());
        args.push(rule.clone());
    }
    for rule in &tool.folder_renames {
        args.push("--regextrans2".to_string());
        args.push(rule.clone());
    }
    args.push("--useuid".to_string());
    args.push("--usecache".to_string());
    args.push("--tmpdir".to_string());
    args.push(job_tmp_dir(tool, job_id).display().to_string());
    args.push("--syncinternaldates".to_string());
    args.push("--progress".to_string());
    args
}

/// Credential check only: log in to both sides and exit.
pub fn login_args(source: &Endpoint, destination: &Endpoint) -> Vec<String> {
    let mut args = vec!["--justlogin".to_string()];
    endpoint_args(&mut args, source, destination);
    args
}
