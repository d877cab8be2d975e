use crate::core::price::DisplayUnit;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_PRIMARY_FEED_URL: &str =
    "https://bitcoin-rss.cloud.vinney.xyz/bitcoin_price_feed.xml";
pub const DEFAULT_FALLBACK_FEED_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Minutes between refreshes; doubles as the cache staleness window.
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u64 = 25;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedsConfig {
    pub primary: Option<FeedConfig>,
    pub fallback: Option<FeedConfig>,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        FeedsConfig {
            primary: Some(FeedConfig {
                url: DEFAULT_PRIMARY_FEED_URL.to_string(),
            }),
            fallback: Some(FeedConfig {
                url: DEFAULT_FALLBACK_FEED_URL.to_string(),
            }),
        }
    }
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MINUTES
}

fn default_display() -> DisplayUnit {
    DisplayUnit::Satoshi
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(default = "default_display")]
    pub display: DisplayUnit,
    /// Override the shared store location; defaults to the app data dir.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            feeds: FeedsConfig::default(),
            update_interval: default_update_interval(),
            display: default_display(),
            store_path: None,
        }
    }
}

impl AppConfig {
    /// Load from the default path, falling back to built-in defaults when no
    /// config file exists yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file at {}; using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "satsify", "satsify")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "satsify", "satsify")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval * 60)
    }

    pub fn primary_url(&self) -> &str {
        self.feeds
            .primary
            .as_ref()
            .map_or(DEFAULT_PRIMARY_FEED_URL, |f| f.url.as_str())
    }

    pub fn fallback_url(&self) -> &str {
        self.feeds
            .fallback
            .as_ref()
            .map_or(DEFAULT_FALLBACK_FEED_URL, |f| f.url.as_str())
    }
}
