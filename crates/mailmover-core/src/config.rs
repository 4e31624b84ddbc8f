use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of attempts per transfer (including the first).
    pub attempts: u32,
    /// Base delay in seconds for linear backoff (attempt n waits n * base).
    pub base_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_secs: 5.0,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs.max(0.0))
    }
}

/// How the external imapsync program is invoked (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Program name or path of the transfer tool.
    pub program: String,
    /// Directory under which each job gets its own `tmp_<id>` directory.
    pub tmp_root: PathBuf,
    /// Folder patterns passed as `--exclude`.
    pub excludes: Vec<String>,
    /// Folder rename rules passed as `--regextrans2`.
    pub folder_renames: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "imapsync".to_string(),
            tmp_root: PathBuf::from("."),
            excludes: vec![
                r"^Junk\ E-Mail".to_string(),
                r"^Deleted\ Items".to_string(),
                "^Deleted".to_string(),
                "^Trash".to_string(),
            ],
            folder_renames: vec![
                "s#^Sent$#Sent Items#".to_string(),
                "s#^Spam$#Junk E-Mail#".to_string(),
            ],
        }
    }
}

/// Global configuration loaded from `~/.config/mailmover/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailmoverConfig {
    /// Maximum number of transfers holding the external resource at once.
    pub max_concurrent_transfers: usize,
    /// Connection pool size. Reserved; the admission gate is the only limiter today.
    pub connection_pool_size: usize,
    /// How long a successful transfer is remembered, in seconds.
    pub cache_ttl_secs: u64,
    /// Interval of the periodic cache sweep, in seconds.
    pub cache_cleanup_interval_secs: u64,
    /// Resident memory ceiling in MiB; above it the cache is flushed.
    pub memory_limit_mb: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional tool invocation settings; if missing, imapsync defaults are used.
    #[serde(default)]
    pub tool: Option<ToolConfig>,
}

impl Default for MailmoverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 3,
            connection_pool_size: 5,
            cache_ttl_secs: 30 * 60,
            cache_cleanup_interval_secs: 10 * 60,
            memory_limit_mb: 512,
            retry: None,
            tool: None,
        }
    }
}

impl MailmoverConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_interval_secs)
    }

    /// Retry settings with defaults filled in.
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Tool settings with defaults filled in.
    pub fn tool_config(&self) -> ToolConfig {
        self.tool.clone().unwrap_or_default()
    }

    /// Reject values the manager cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_transfers == 0 {
            bail!("max_concurrent_transfers must be at least 1");
        }
        if self.connection_pool_size == 0 {
            bail!("connection_pool_size must be at least 1");
        }
        if self.cache_cleanup_interval_secs == 0 {
            bail!("cache_cleanup_interval_secs must be at least 1");
        }
        let retry = self.retry_config();
        if retry.attempts == 0 {
            bail!("retry.attempts must be at least 1");
        }
        if !retry.base_delay_secs.is_finite() || retry.base_delay_secs < 0.0 {
            bail!("retry.base_delay_secs must be a non-negative number");
        }
        if self.tool_config().program.trim().is_empty() {
            bail!("tool.program must not be empty");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mailmover")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MailmoverConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MailmoverConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MailmoverConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
