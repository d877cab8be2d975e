//! Exchange-rate abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A captured BTC/USD exchange rate plus the instant it was captured.
///
/// Serde field names are the persistent wire format shared with other
/// instances; renames here break the store schema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// USD per one BTC. Always finite and positive.
    pub price: f64,
    /// Capture instant, epoch milliseconds.
    pub timestamp: i64,
    pub version: u32,
}

impl PriceSnapshot {
    pub fn new(price: f64, timestamp: i64) -> Self {
        Self {
            price,
            timestamp,
            version: SNAPSHOT_SCHEMA_VERSION,
        }
    }

    /// A snapshot is stale once it has lived through a full refresh window.
    pub fn is_stale(&self, now_ms: i64, refresh_interval: Duration) -> bool {
        now_ms - self.timestamp >= refresh_interval.as_millis() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayUnit {
    #[serde(rename = "btc", alias = "bitcoin")]
    Bitcoin,
    #[serde(rename = "sats", alias = "satoshi")]
    Satoshi,
}

impl Display for DisplayUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DisplayUnit::Bitcoin => "btc",
                DisplayUnit::Satoshi => "sats",
            }
        )
    }
}

impl FromStr for DisplayUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(DisplayUnit::Bitcoin),
            "sats" | "satoshi" | "satoshis" => Ok(DisplayUnit::Satoshi),
            _ => Err(anyhow::anyhow!("Invalid display unit: {}", s)),
        }
    }
}

/// A remote source for the current BTC/USD rate.
#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch_rate(&self) -> Result<f64>;
}

/// Epoch milliseconds now, the clock every component shares.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
