//! Configuration management for Omnipost

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::rate_limiter::RateLimit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
    /// Per-platform request budgets, merged over [`default_rate_limits`]
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitConfig>,
    /// Per-platform endpoint and credentials
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks
    pub poll_interval: u64,
    pub max_retries: u32,
    /// Seconds allowed for a single outbound publish call
    pub publish_timeout: u64,
    /// Offset from UTC used when checking publish windows
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            max_retries: 3,
            publish_timeout: 30,
            utc_offset_minutes: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    /// Master switch; when false no adapter resolves
    pub enabled: bool,
    /// Wrap adapters with the per-platform rate limiter
    pub rate_limited: bool,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limited: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    /// Window length in seconds
    pub interval: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        if let Ok(db_path) = std::env::var("OMNIPOST_DB_PATH") {
            config.database.path = db_path;
        }
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/omnipost/posts.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            adapters: AdaptersConfig::default(),
            rate_limits: HashMap::new(),
            platforms: HashMap::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.poll_interval == 0 {
            return Err(invalid("scheduler.poll_interval", "must be at least 1 second"));
        }
        if self.scheduler.publish_timeout == 0 {
            return Err(invalid("scheduler.publish_timeout", "must be at least 1 second"));
        }
        if !(-1439..=1439).contains(&self.scheduler.utc_offset_minutes) {
            return Err(invalid(
                "scheduler.utc_offset_minutes",
                "must be within one day of UTC",
            ));
        }
        for (platform, limit) in &self.rate_limits {
            if limit.interval == 0 {
                return Err(invalid(
                    &format!("rate_limits.{}.interval", platform),
                    "must be at least 1 second",
                ));
            }
        }
        Ok(())
    }

    /// Effective per-platform limits: built-in defaults overlaid with config
    pub fn effective_rate_limits(&self) -> HashMap<String, RateLimit> {
        let mut limits = default_rate_limits();
        for (platform, limit) in &self.rate_limits {
            limits.insert(
                platform.to_lowercase(),
                RateLimit::new(limit.limit, Duration::from_secs(limit.interval)),
            );
        }
        limits
    }

    /// Endpoint settings for a platform, if any were configured
    pub fn platform(&self, name: &str) -> PlatformConfig {
        self.platforms
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, cfg)| cfg.clone())
            .unwrap_or_default()
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::OmnipostError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Hourly request budgets applied when the config names none
pub fn default_rate_limits() -> HashMap<String, RateLimit> {
    let hour = Duration::from_secs(3600);
    [
        ("instagram", 200),
        ("facebook", 200),
        ("tiktok", 200),
        ("linkedin", 200),
        ("youtube", 200),
        ("twitter", 300),
        ("reddit", 300),
        ("pinterest", 300),
        ("bluesky", 300),
        ("telegram", 1000),
        ("discord", 1000),
    ]
    .into_iter()
    .map(|(name, limit)| (name.to_string(), RateLimit::new(limit, hour)))
    .collect()
}

/// Resolve the configuration file path following the XDG Base Directory layout
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("OMNIPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("omnipost").join("config.toml"))
}
