//! `mailmover config` – show where the config lives and what is in effect.

use anyhow::Result;
use mailmover_core::config::{self, MailmoverConfig};
use mailmover_core::logging;

pub fn run_config(cfg: &MailmoverConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    if let Ok(path) = logging::log_file_path() {
        println!("log file:    {}", path.display());
    }
    println!();
    print!("{}", effective_toml(cfg)?);
    Ok(())
}

/// The config with optional sections filled in, as TOML.
fn effective_toml(cfg: &MailmoverConfig) -> Result<String> {
    let mut effective = cfg.clone();
    effective.retry = Some(cfg.retry_config());
    effective.tool = Some(cfg.tool_config());
    Ok(toml::to_string_pretty(&effective)?)
}
