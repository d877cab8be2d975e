use crate::core::price::RateFeed;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Fallback feed: CoinGecko's simple-price JSON endpoint.
pub struct CoinGeckoFeed {
    url: String,
}

impl CoinGeckoFeed {
    pub fn new(url: &str) -> Self {
        CoinGeckoFeed {
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: BitcoinQuote,
}

#[derive(Debug, Deserialize)]
struct BitcoinQuote {
    usd: f64,
}

#[async_trait]
impl RateFeed for CoinGeckoFeed {
    async fn fetch_rate(&self) -> Result<f64> {
        debug!("Requesting fallback BTC price from {}", self.url);

        let client = reqwest::Client::builder()
            .user_agent("satsify/1.0")
            .build()?;
        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for URL: {}", e, self.url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} from fallback feed",
                response.status()
            ));
        }

        let text = response.text().await?;
        let data: SimplePriceResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse fallback feed response: {}", e))?;

        let rate = data.bitcoin.usd;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(anyhow!("Fallback feed price out of range: {rate}"));
        }

        debug!("Parsed fallback BTC price: {}", rate);
        Ok(rate)
    }
}
