//! Conversion engine: idempotent storefront price rewriting

pub mod format;

pub use format::{SATS_PER_BTC, format_btc};

use crate::core::price::DisplayUnit;
use crate::page::{Document, NodeId, Selector};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Marker attribute set on a price element once its pass completes.
pub const PROCESSED_ATTR: &str = "data-btc-processed";
/// Class carried by nested currency sub-elements.
pub const MONEY_CLASS: &str = "money";
pub const DISPLAY_CLASS: &str = "btc-price-display";
pub const AMOUNT_CLASS: &str = "btc-amount";

/// Price-bearing elements the engine scopes itself to.
const PRICE_SELECTOR_SET: &[&str] = &[
    ".price",
    ".product-price",
    ".money",
    "[data-price]",
    ".price-item",
    ".product__price",
    ".h2.price",
];

/// Checkout and cart contexts. Elements inside these are never rewritten,
/// regardless of configuration; payment-critical displays stay untouched.
const CHECKOUT_SELECTOR_SET: &[&str] = &[
    ".checkout",
    ".cart",
    "[data-cart-drawer]",
    ".order-summary",
    ".payment-summary",
];

static PRICE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    PRICE_SELECTOR_SET
        .iter()
        .map(|s| Selector::parse(s).expect("Invalid price selector"))
        .collect()
});

static CHECKOUT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CHECKOUT_SELECTOR_SET
        .iter()
        .map(|s| Selector::parse(s).expect("Invalid checkout selector"))
        .collect()
});

static MONEY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::Classes(vec![MONEY_CLASS.to_string()]));

/// Leading dollar-formatted amount inside a money element.
static USD_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d,.]+").expect("Invalid regex"));

struct PriceBinding {
    /// Detached masters of the element's pre-conversion children, captured
    /// exactly once. Every render starts from a fresh clone of these.
    original: Vec<NodeId>,
    processed: bool,
}

pub struct ConversionEngine {
    unit: DisplayUnit,
    enabled: bool,
    bindings: HashMap<NodeId, PriceBinding>,
}

impl ConversionEngine {
    pub fn new(unit: DisplayUnit) -> Self {
        Self {
            unit,
            enabled: true,
            bindings: HashMap::new(),
        }
    }

    pub fn display_unit(&self) -> DisplayUnit {
        self.unit
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Label for the host page's floating toggle button.
    pub fn toggle_label(&self) -> &'static str {
        match self.unit {
            DisplayUnit::Satoshi => "Display: \u{0180} Satoshis",
            DisplayUnit::Bitcoin => "Display: \u{20BF} BTC",
        }
    }

    /// Rewrite every price-bearing element on the page. Safe to call any
    /// number of times: each pass renders from the captured originals, so
    /// the result of N passes is the result of one.
    pub fn convert_all(&mut self, doc: &mut Document, rate: Option<f64>) {
        if !self.enabled {
            debug!("Conversion disabled; skipping pass");
            return;
        }
        let Some(rate) = rate.filter(|r| r.is_finite() && *r > 0.0) else {
            debug!("No usable BTC rate; leaving prices untouched");
            return;
        };
        if is_checkout_page(doc) {
            debug!("Checkout page; conversion suppressed");
            return;
        }

        let candidates: Vec<NodeId> = doc
            .elements()
            .into_iter()
            .filter(|&id| {
                doc.element(id)
                    .is_some_and(|el| PRICE_SELECTORS.iter().any(|s| s.matches(el)))
            })
            .collect();

        for id in candidates {
            // Converting an outer element re-renders its subtree, detaching
            // any inner candidates collected above.
            if !doc.is_attached(id) {
                continue;
            }
            if doc.closest(id, &CHECKOUT_SELECTORS).is_some() {
                continue;
            }
            self.convert_element(doc, id, rate);
        }
    }

    /// Disabling restores every bound element to its captured original and
    /// clears the processed marker. Re-enabling does not convert; the next
    /// `convert_all` does.
    pub fn set_enabled(&mut self, enabled: bool, doc: &mut Document) {
        self.enabled = enabled;
        if enabled {
            return;
        }
        for (&id, binding) in self.bindings.iter_mut() {
            if !doc.is_attached(id) {
                continue;
            }
            let fresh: Vec<NodeId> = binding
                .original
                .iter()
                .map(|&m| doc.clone_subtree(m))
                .collect();
            doc.replace_children(id, fresh);
            doc.remove_attr(id, PROCESSED_ATTR);
            binding.processed = false;
        }
        debug!("Restored {} bound elements", self.bindings.len());
    }

    pub fn set_display_unit(&mut self, unit: DisplayUnit, doc: &mut Document, rate: Option<f64>) {
        self.unit = unit;
        self.convert_all(doc, rate);
    }

    fn convert_element(&mut self, doc: &mut Document, id: NodeId, rate: f64) {
        let binding = self.bindings.entry(id).or_insert_with(|| PriceBinding {
            // Capture-once: the entry guard means converted markup can
            // never overwrite a stored original.
            original: doc.clone_children(id),
            processed: false,
        });
        let masters = binding.original.clone();

        // Reset to a parsed copy of the original before converting, so a
        // previously rendered state never feeds into this pass.
        let fresh: Vec<NodeId> = masters.iter().map(|&m| doc.clone_subtree(m)).collect();
        doc.replace_children(id, fresh);

        for money in doc.descendant_elements(id) {
            let Some(el) = doc.element(money) else {
                continue;
            };
            if !MONEY_SELECTOR.matches(el) {
                continue;
            }
            let text = doc.text_content(money);
            let Some(usd) = extract_usd_amount(&text) else {
                debug!("No dollar amount in money element; skipping: '{}'", text);
                continue;
            };

            let formatted = format_btc(usd / rate, self.unit);
            let wrapper = doc.create_element("span");
            doc.add_class(wrapper, DISPLAY_CLASS);
            let amount = doc.create_element("span");
            doc.add_class(amount, AMOUNT_CLASS);
            let label = doc.create_text(&formatted);
            doc.append_child(amount, label);
            doc.append_child(wrapper, amount);
            doc.replace_children(money, vec![wrapper]);
        }

        doc.set_attr(id, PROCESSED_ATTR, "true");
        if let Some(binding) = self.bindings.get_mut(&id) {
            binding.processed = true;
        }
    }
}

fn is_checkout_page(doc: &Document) -> bool {
    doc.path().contains("/checkout") || doc.has_class(doc.body(), "template-cart")
}

fn extract_usd_amount(text: &str) -> Option<f64> {
    let token = USD_AMOUNT.find(text)?.as_str();
    let cleaned = token.trim_start_matches('$').replace(',', "");
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}
