//! Application controller
//!
//! Composes the oracle, the engine and the watcher around one page, relays
//! host platform events into conversion passes, and drives the periodic
//! refresh. Everything runs on one cooperative task; suspension happens only
//! at network calls and scheduled delays.

use crate::core::price::DisplayUnit;
use crate::engine::ConversionEngine;
use crate::oracle::{PriceOracle, RefreshOutcome};
use crate::page::Document;
use crate::watcher::ContentWatcher;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info};

/// Let the platform finish its own section re-render before converting.
pub const SECTION_SETTLE_DELAY: Duration = Duration::from_millis(200);
pub const VARIANT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// A host-applied change to the live page (section re-render, drawer
/// injection). Runs inside the page context, so document observers fire.
pub type DocumentEdit = Box<dyn FnOnce(&mut Document) + Send>;

pub enum AppEvent {
    /// The platform reloaded a storefront section.
    SectionLoad,
    /// A product variant selection changed.
    VariantChange,
    /// Coalesced content mutation from the watcher.
    Reconvert,
    /// Flip between satoshi and BTC display.
    ToggleUnit,
    SetEnabled(bool),
    /// External reconfiguration; applies to the next scheduled refresh.
    Configure { update_interval_minutes: u64 },
    /// Host content mutation entering the page context.
    Mutate(DocumentEdit),
    Shutdown,
}

#[derive(Clone)]
pub struct AppHandle {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl AppHandle {
    pub fn send(&self, event: AppEvent) {
        // A closed channel means the page is gone; nothing left to notify.
        let _ = self.tx.send(event);
    }
}

pub struct App {
    oracle: PriceOracle,
    engine: ConversionEngine,
    document: Document,
    events: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
    watcher: Option<ContentWatcher>,
}

impl App {
    pub fn new(oracle: PriceOracle, unit: DisplayUnit, document: Document) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            oracle,
            engine: ConversionEngine::new(unit),
            document,
            events,
            tx,
            watcher: None,
        }
    }

    pub fn handle(&self) -> AppHandle {
        AppHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    /// Startup sequence, invoked once the host signals readiness: acquire a
    /// rate, run the initial conversion pass, then start watching content.
    async fn start(&mut self) {
        info!("Starting Bitcoin price display");
        self.oracle.refresh().await;
        self.convert();

        let handle = self.handle();
        let watcher = ContentWatcher::spawn(move || handle.send(AppEvent::Reconvert));
        self.document.observe(watcher.observer());
        self.watcher = Some(watcher);
    }

    /// Run until [`AppEvent::Shutdown`] or until every handle is dropped.
    pub async fn run(&mut self) {
        self.start().await;

        let mut next_refresh = Instant::now() + self.oracle.refresh_interval();
        loop {
            tokio::select! {
                _ = sleep_until(next_refresh) => {
                    if self.oracle.refresh().await == RefreshOutcome::Updated {
                        self.convert();
                    }
                    next_refresh = Instant::now() + self.oracle.refresh_interval();
                }
                event = self.events.recv() => match event {
                    Some(AppEvent::Shutdown) | None => {
                        debug!("Shutting down");
                        break;
                    }
                    Some(event) => self.handle_event(event).await,
                }
            }
        }
    }

    async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SectionLoad => {
                sleep(SECTION_SETTLE_DELAY).await;
                self.convert();
            }
            AppEvent::VariantChange => {
                sleep(VARIANT_SETTLE_DELAY).await;
                self.convert();
            }
            AppEvent::Reconvert => self.convert(),
            AppEvent::ToggleUnit => {
                let unit = match self.engine.display_unit() {
                    DisplayUnit::Satoshi => DisplayUnit::Bitcoin,
                    DisplayUnit::Bitcoin => DisplayUnit::Satoshi,
                };
                let rate = self.current_rate();
                self.engine.set_display_unit(unit, &mut self.document, rate);
            }
            AppEvent::SetEnabled(enabled) => {
                self.engine.set_enabled(enabled, &mut self.document);
            }
            AppEvent::Configure {
                update_interval_minutes,
            } => {
                info!(
                    "Reconfigured update interval to {} minutes",
                    update_interval_minutes
                );
                self.oracle
                    .set_refresh_interval(Duration::from_secs(update_interval_minutes * 60));
            }
            AppEvent::Mutate(edit) => edit(&mut self.document),
            AppEvent::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn current_rate(&self) -> Option<f64> {
        self.oracle.current_price().map(|snap| snap.price)
    }

    fn convert(&mut self) {
        let rate = self.current_rate();
        self.engine.convert_all(&mut self.document, rate);
    }
}
