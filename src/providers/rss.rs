use crate::core::price::RateFeed;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Text of the first `item > title` element in the feed.
static ITEM_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<item\b[^>]*>.*?<title\b[^>]*>(.*?)</title>").expect("Invalid regex")
});

/// Dollar-formatted amount, thousands separators allowed.
static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([0-9,]+\.?[0-9]*)").expect("Invalid regex"));

/// Primary feed: an RSS document whose latest item title carries the price
/// as a `$<amount>` token.
pub struct RssRateFeed {
    url: String,
}

impl RssRateFeed {
    pub fn new(url: &str) -> Self {
        RssRateFeed {
            url: url.to_string(),
        }
    }
}

fn parse_feed_rate(xml: &str) -> Result<f64> {
    let title = ITEM_TITLE
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| anyhow!("No item title found in price feed"))?;

    let amount = DOLLAR_AMOUNT
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| anyhow!("No dollar amount in feed title: '{title}'"))?;

    let rate: f64 = amount
        .replace(',', "")
        .parse()
        .with_context(|| format!("Failed to parse feed price: '{amount}'"))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(anyhow!("Feed price out of range: {rate}"));
    }
    Ok(rate)
}

#[async_trait]
impl RateFeed for RssRateFeed {
    async fn fetch_rate(&self) -> Result<f64> {
        debug!("Requesting BTC price feed from {}", self.url);

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
                "HTTP error: {} from price feed: {}",
                response.status(),
                self.url
            ));
        }

        let xml = response
            .text()
            .await
            .context("Failed to read price feed body")?;
        let rate = parse_feed_rate(&xml)?;

        debug!("Parsed BTC price from feed: {}", rate);
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_PATH: &str = "/bitcoin_price_feed.xml";

    async fn create_mock_server(mock_response: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FEED_PATH))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn feed_url(server: &MockServer) -> String {
        format!("{}{}", server.uri(), FEED_PATH)
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_response = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
                <title>Bitcoin Price Feed</title>
                <item>
                    <title>Bitcoin price: $67,123.45 USD</title>
                    <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
                </item>
            </channel></rss>"#;

        let mock_server = create_mock_server(mock_response, 200).await;
        let feed = RssRateFeed::new(&feed_url(&mock_server));

        let rate = feed.fetch_rate().await.unwrap();
        assert_eq!(rate, 67123.45);
    }

    #[tokio::test]
    async fn test_thousands_separators_are_stripped() {
        let mock_response =
            "<rss><channel><item><title>BTC at $1,234,567</title></item></channel></rss>";
        let mock_server = create_mock_server(mock_response, 200).await;
        let feed = RssRateFeed::new(&feed_url(&mock_server));

        let rate = feed.fetch_rate().await.unwrap();
        assert_eq!(rate, 1_234_567.0);
    }

    #[tokio::test]
    async fn test_channel_title_is_not_mistaken_for_item_title() {
        // The channel-level title carries no price; only item titles count
        let mock_response = r#"<rss><channel>
            <title>Feed about $0 fees</title>
            <item><title>Price now $50,000.00</title></item>
        </channel></rss>"#;
        let mock_server = create_mock_server(mock_response, 200).await;
        let feed = RssRateFeed::new(&feed_url(&mock_server));

        let rate = feed.fetch_rate().await.unwrap();
        assert_eq!(rate, 50000.0);
    }

    #[tokio::test]
    async fn test_missing_item_title() {
        let mock_response = "<rss><channel><title>empty feed</title></channel></rss>";
        let mock_server = create_mock_server(mock_response, 200).await;
        let feed = RssRateFeed::new(&feed_url(&mock_server));

        let result = feed.fetch_rate().await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No item title found in price feed"
        );
    }

    #[tokio::test]
    async fn test_title_without_dollar_token() {
        let mock_response =
            "<rss><channel><item><title>Bitcoin is doing fine</title></item></channel></rss>";
        let mock_server = create_mock_server(mock_response, 200).await;
        let feed = RssRateFeed::new(&feed_url(&mock_server));

        let result = feed.fetch_rate().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("No dollar amount in feed title")
        );
    }

    #[tokio::test]
    async fn test_http_error_response() {
        let mock_server = create_mock_server("Server Error", 500).await;
        let feed = RssRateFeed::new(&feed_url(&mock_server));

        let result = feed.fetch_rate().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().starts_with("HTTP error: 500"));
    }

    #[test]
    fn test_unparseable_amount_is_rejected() {
        // Pattern matches but the digits do not form a number
        let result = parse_feed_rate("<item><title>now $,.</title></item>");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let result = parse_feed_rate("<item><title>free bitcoin $0</title></item>");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of range"));
    }
}
