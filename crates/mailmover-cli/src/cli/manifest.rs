//! Jobs manifest: the list of mailbox pairs to transfer.
//!
//! ```toml
//! [[job]]
//! id = "alice"                      # optional
//! source = { host = "imap.old.example", account = "alice@old.example", password_env = "ALICE_OLD" }
//! destination = { host = "imap.new.example", account = "alice@new.example", password = "s3cret" }
//! ```

use anyhow::{bail, Context, Result};
use mailmover_core::{Endpoint, NewJob, Secret};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(rename = "job", default)]
    pub jobs: Vec<ManifestJob>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestJob {
    pub id: Option<String>,
    pub source: ManifestEndpoint,
    pub destination: ManifestEndpoint,
}

/// One side of a job. Exactly one of `password` / `password_env` must be set.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEndpoint {
    pub host: String,
    pub account: String,
    pub password: Option<String>,
    pub password_env: Option<String>,
}

impl std::fmt::Debug for ManifestEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestEndpoint")
            .field("host", &self.host)
            .field("account", &self.account)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("password_env", &self.password_env)
            .finish()
    }
}

impl ManifestEndpoint {
    fn resolve(self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Endpoint> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.account.trim().is_empty() {
            bail!("account must not be empty");
        }
        let password = match (self.password, self.password_env) {
            (Some(p), None) => p,
            (None, Some(var)) => lookup(&var)
                .with_context(|| format!("environment variable {} is not set", var))?,
            (Some(_), Some(_)) => bail!(
                "{}: set either password or password_env, not both",
                self.account
            ),
            (None, None) => bail!("{}: missing password or password_env", self.account),
        };
        Ok(Endpoint::new(self.host, self.account, Secret::new(password)))
    }
}

impl Manifest {
    pub fn parse(data: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(data).context("parse jobs manifest")?;
        if manifest.jobs.is_empty() {
            bail!("manifest lists no [[job]] entries");
        }
        let mut seen = HashSet::new();
        for id in manifest.jobs.iter().filter_map(|j| j.id.as_deref()) {
            if !seen.insert(id) {
                bail!("duplicate job id {:?} in manifest", id);
            }
        }
        Ok(manifest)
    }

    /// Resolve passwords from the process environment.
    pub fn into_jobs(self) -> Result<Vec<NewJob>> {
        self.into_jobs_with(&|name| std::env::var(name).ok())
    }

    /// Resolve passwords with an explicit variable lookup.
    pub fn into_jobs_with(self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Vec<NewJob>> {
        self.jobs
            .into_iter()
            .enumerate()
            .map(|(i, job)| {
                let label = job.id.clone().unwrap_or_else(|| format!("#{}", i + 1));
                let source = job
                    .source
                    .resolve(lookup)
                    .with_context(|| format!("job {} source", label))?;
                let destination = job
                    .destination
                    .resolve(lookup)
                    .with_context(|| format!("job {} destination", label))?;
                let new_job = NewJob::new(source, destination);
                Ok(match job.id {
                    Some(id) => new_job.with_id(id),
                    None => new_job,
                })
            })
            .collect()
    }
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read manifest {}", path.display()))?;
    Manifest::parse(&data).with_context(|| format!("manifest {}", path.display()))
}
