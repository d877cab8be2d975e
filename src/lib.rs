pub mod app;
pub mod config;
pub mod core;
pub mod engine;
pub mod log;
pub mod oracle;
pub mod page;
pub mod providers;
pub mod store;
pub mod watcher;

use crate::config::AppConfig;
use crate::core::store::SharedStore;
use crate::engine::ConversionEngine;
use crate::oracle::PriceOracle;
use crate::providers::{CoinGeckoFeed, RssRateFeed};
use crate::store::{DiskStore, MemoryStore};
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Price,
    Convert {
        input: PathBuf,
        output: Option<PathBuf>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Bitcoin price display starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = open_shared_store(&config);
    let primary = Arc::new(RssRateFeed::new(config.primary_url()));
    let fallback = Arc::new(CoinGeckoFeed::new(config.fallback_url()));
    let mut oracle = PriceOracle::new(store, primary, fallback, config.refresh_interval());

    match command {
        AppCommand::Price => {
            oracle.refresh().await;
            let Some(snap) = oracle.current_price() else {
                bail!("No BTC price available; both feeds unreachable");
            };
            let captured = chrono::DateTime::from_timestamp_millis(snap.timestamp)
                .map_or_else(|| snap.timestamp.to_string(), |dt| dt.to_rfc3339());
            println!("1 BTC = ${} USD (as of {})", snap.price, captured);
            Ok(())
        }
        AppCommand::Convert { input, output } => {
            let markup = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read input file: {}", input.display()))?;
            let mut document = page::parse_document(&markup, "/")?;

            oracle.refresh().await;
            if oracle.current_price().is_none() {
                warn!("No BTC price available; emitting the page unconverted");
            }

            let mut engine = ConversionEngine::new(config.display);
            let rate = oracle.current_price().map(|snap| snap.price);
            engine.convert_all(&mut document, rate);

            let html = document.to_html();
            match output {
                Some(path) => std::fs::write(&path, html)
                    .with_context(|| format!("Failed to write output file: {}", path.display()))?,
                None => println!("{html}"),
            }
            Ok(())
        }
    }
}

/// The persistent profile store, shared by every satsify process. Falls back
/// to a process-local store when no data directory is available.
fn open_shared_store(config: &AppConfig) -> Arc<dyn SharedStore> {
    let path = match &config.store_path {
        Some(path) => Ok(path.clone()),
        None => AppConfig::default_data_path().map(|path| path.join("store")),
    };
    match path.and_then(|path| DiskStore::open(&path)) {
        Ok(disk) => Arc::new(disk),
        Err(e) => {
            warn!("Falling back to in-memory store: {:#}", e);
            Arc::new(MemoryStore::new())
        }
    }
}
