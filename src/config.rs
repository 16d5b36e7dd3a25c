//! TOML configuration parsing.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults the badge ships with (7-day show cache, 10-minute server cache
//! capped at 50 entries, 350/900/1800 ms retry schedule, 500 ms mutation
//! debounce).
//!
//! ```toml
//! [store]
//! path = "./data/plexbadge.sqlite"
//!
//! [cache]
//! show_ttl_days = 7
//! server_ttl_minutes = 10
//! server_max_entries = 50
//!
//! [retry]
//! delays_ms = [350, 900, 1800]
//!
//! [navigation]
//! debounce_ms = 500
//! ready_timeout_ms = 4000
//!
//! [provider]
//! base_url = "https://www.serializd.com"
//!
//! [plex]
//! directory_url = "https://plex.tv/api/v2/resources?includeHttps=1"
//! timeout_secs = 15
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub plex: PlexConfig,
}

/// Persistent cache location. Without a path the caches live in memory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_show_ttl_days")]
    pub show_ttl_days: u64,
    #[serde(default = "default_server_ttl_minutes")]
    pub server_ttl_minutes: u64,
    #[serde(default = "default_server_max_entries")]
    pub server_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            show_ttl_days: default_show_ttl_days(),
            server_ttl_minutes: default_server_ttl_minutes(),
            server_max_entries: default_server_max_entries(),
        }
    }
}

fn default_show_ttl_days() -> u64 {
    7
}
fn default_server_ttl_minutes() -> u64 {
    10
}
fn default_server_max_entries() -> usize {
    50
}

impl CacheConfig {
    pub fn show_ttl(&self) -> Duration {
        Duration::from_secs(self.show_ttl_days * 24 * 60 * 60)
    }

    pub fn server_ttl(&self) -> Duration {
        Duration::from_secs(self.server_ttl_minutes * 60)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_delays_ms")]
    pub delays_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delays_ms: default_delays_ms(),
        }
    }
}

fn default_delays_ms() -> Vec<u64> {
    vec![350, 900, 1800]
}

impl RetryConfig {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NavigationConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound on waiting for the page to render its title after an
    /// href change.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

impl NavigationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

fn default_debounce_ms() -> u64 {
    500
}
fn default_ready_timeout_ms() -> u64 {
    4000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://www.serializd.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlexConfig {
    #[serde(default = "default_directory_url")]
    pub directory_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            directory_url: default_directory_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_directory_url() -> String {
    "https://plex.tv/api/v2/resources?includeHttps=1".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

impl Config {
    /// Defaults only, for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.cache.show_ttl_days == 0 {
        anyhow::bail!("cache.show_ttl_days must be > 0");
    }
    if config.cache.server_ttl_minutes == 0 {
        anyhow::bail!("cache.server_ttl_minutes must be > 0");
    }
    if config.cache.server_max_entries == 0 {
        anyhow::bail!("cache.server_max_entries must be >= 1");
    }

    let delays = &config.retry.delays_ms;
    if delays.is_empty() {
        anyhow::bail!("retry.delays_ms must list at least one delay");
    }
    if delays.windows(2).any(|w| w[1] < w[0]) {
        anyhow::bail!("retry.delays_ms must be non-decreasing");
    }

    if config.navigation.debounce_ms == 0 {
        anyhow::bail!("navigation.debounce_ms must be > 0");
    }

    for (field, value) in [
        ("provider.base_url", &config.provider.base_url),
        ("plex.directory_url", &config.plex.directory_url),
    ] {
        let parsed =
            url::Url::parse(value).with_context(|| format!("{} is not a valid URL", field))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => anyhow::bail!("{} must use http or https, got '{}'", field, other),
        }
    }

    Ok(())
}
