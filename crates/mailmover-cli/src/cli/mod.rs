//! CLI for the mailmover parallel transfer manager.

mod commands;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mailmover_core::config;
use std::path::PathBuf;

use commands::{run_check, run_config, run_transfers};

/// Top-level CLI for mailmover.
#[derive(Debug, Parser)]
#[command(name = "mailmover")]
#[command(about = "mailmover: run many imapsync mailbox transfers in parallel", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Transfer every mailbox listed in a jobs manifest.
    Run {
        /// TOML manifest with one [[job]] table per mailbox.
        manifest: PathBuf,
        /// Override max_concurrent_transfers from the config file.
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Log in to both servers of every job without transferring anything.
    Check {
        /// TOML manifest with one [[job]] table per mailbox.
        manifest: PathBuf,
    },

    /// Show the config file path and effective values.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run { manifest, jobs } => {
                if let Some(n) = jobs {
                    cfg.max_concurrent_transfers = n;
                    cfg.validate()?;
                }
                run_transfers(&cfg, &manifest).await?;
            }
            CliCommand::Check { manifest } => run_check(&cfg, &manifest).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
