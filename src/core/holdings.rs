//! Fund holdings and the provider abstraction that fetches them.

use crate::core::error::DataError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Exchange suffixes stripped during normalization, e.g. `ASML.AS` or `SHOP.TO`.
const EXCHANGE_SUFFIXES: &[&str] = &[
    "US", "L", "LN", "TO", "V", "DE", "F", "PA", "AS", "BR", "MI", "MC", "SW", "HK", "T", "AX",
    "KS", "SS", "SZ", "NS", "BO", "ST", "CO", "OL", "HE",
];

/// Normalizes a constituent ticker so the same security compares equal across
/// providers.
///
/// `nasdaq:aapl`, `AAPL.US` and ` aapl ` all become `AAPL`; share classes such
/// as `BRK.B`, `BRK/B` and `BRK B` become `BRK-B`.
pub fn normalize_symbol(raw: &str) -> String {
    let mut symbol = raw.trim().to_uppercase();

    if let Some((_, rest)) = symbol.split_once(':') {
        symbol = rest.trim().to_string();
    }

    if let Some(idx) = symbol.rfind(['.', '/', ' ']) {
        let (base, suffix) = (&symbol[..idx], &symbol[idx + 1..]);
        if !base.is_empty() {
            if EXCHANGE_SUFFIXES.contains(&suffix) {
                symbol = base.trim().to_string();
            } else if suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_alphabetic()) {
                symbol = format!("{}-{suffix}", base.trim());
            }
        }
    }

    symbol
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub name: Option<String>,
    /// Percentage of the fund, 0 to 100.
    pub weight: f64,
}

/// Constituents of a single fund keyed by normalized ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingsSet {
    pub fund: String,
    holdings: BTreeMap<String, Holding>,
}

impl HoldingsSet {
    pub fn new(fund: &str) -> Self {
        Self {
            fund: fund.to_string(),
            holdings: BTreeMap::new(),
        }
    }

    /// Adds a constituent. A symbol that normalizes to an existing entry adds
    /// its weight to that entry.
    pub fn insert(&mut self, symbol: &str, name: Option<String>, weight: f64) {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return;
        }
        self.holdings
            .entry(key.clone())
            .and_modify(|h| {
                h.weight += weight;
                if h.name.is_none() {
                    h.name = name.clone();
                }
            })
            .or_insert(Holding {
                symbol: key,
                name,
                weight,
            });
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(&normalize_symbol(symbol))
    }

    /// Holdings in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.holdings.values().map(|h| h.weight).sum()
    }

    /// Whether the weights add up to 100 within `tolerance` percentage points.
    /// Cash positions and rounding keep real funds slightly off.
    pub fn is_complete(&self, tolerance: f64) -> bool {
        (self.total_weight() - 100.0).abs() <= tolerance
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for HoldingsSet {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut set = HoldingsSet::default();
        for (symbol, weight) in iter {
            set.insert(symbol.as_ref(), None, weight);
        }
        set
    }
}

#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    async fn fetch_holdings(&self, ticker: &str) -> Result<HoldingsSet, DataError>;
}
