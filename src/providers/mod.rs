pub mod coingecko;
pub mod rss;

pub use coingecko::CoinGeckoFeed;
pub use rss::RssRateFeed;
