//! Weighted overlap between the holdings of two funds.
//!
//! The overlap is the sum, over every constituent held by both funds, of the
//! smaller of the two weights. Two funds holding `AAPL` at 7% and 5% share 5%
//! of exposure through it.

use crate::core::holdings::HoldingsSet;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::{debug, warn};

/// Percentage points a fund's listed weights may fall short of 100 and still
/// count as its full portfolio.
pub const COMPLETE_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapBand {
    Low,
    Medium,
    High,
}

impl Display for OverlapBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                OverlapBand::Low => "Low",
                OverlapBand::Medium => "Medium",
                OverlapBand::High => "High",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapThresholds {
    pub low_threshold: f64,
    pub high_threshold: f64,
}

impl Default for OverlapThresholds {
    fn default() -> Self {
        Self {
            low_threshold: 30.0,
            high_threshold: 60.0,
        }
    }
}

impl OverlapThresholds {
    /// Below `low_threshold` is Low, above `high_threshold` is High, both
    /// bounds inclusive for Medium.
    pub fn classify(&self, overlap: f64) -> OverlapBand {
        if overlap < self.low_threshold {
            OverlapBand::Low
        } else if overlap <= self.high_threshold {
            OverlapBand::Medium
        } else {
            OverlapBand::High
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SharedHolding {
    pub symbol: String,
    pub name: Option<String>,
    pub weight_a: f64,
    pub weight_b: f64,
    pub overlap: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapResult {
    pub fund_a: String,
    pub fund_b: String,
    /// Intersected weight in percent, 0 to 100.
    pub overlap: f64,
    pub band: OverlapBand,
    /// Shared constituents, largest overlap first.
    pub shared: Vec<SharedHolding>,
    /// Overlap as a share of fund A's total listed weight.
    pub coverage_a: f64,
    pub coverage_b: f64,
    /// Nothing could be compared.
    pub warning: Option<String>,
    /// The figure only covers the holdings the provider listed.
    pub note: Option<String>,
}

pub fn compute_overlap(
    holdings_a: &HoldingsSet,
    holdings_b: &HoldingsSet,
    thresholds: &OverlapThresholds,
) -> OverlapResult {
    let mut result = OverlapResult {
        fund_a: holdings_a.fund.clone(),
        fund_b: holdings_b.fund.clone(),
        overlap: 0.0,
        band: OverlapBand::Low,
        shared: Vec::new(),
        coverage_a: 0.0,
        coverage_b: 0.0,
        warning: None,
        note: None,
    };

    let empty: Vec<&str> = [holdings_a, holdings_b]
        .into_iter()
        .filter(|h| h.is_empty())
        .map(|h| h.fund.as_str())
        .collect();
    if !empty.is_empty() {
        let message = format!(
            "No holdings available for {}; nothing to compare",
            empty.join(", ")
        );
        warn!("{message}");
        result.warning = Some(message);
        return result;
    }

    // Both sides iterate in symbol order, so the sum is the same whichever
    // fund comes first.
    let mut total = 0.0;
    for holding in holdings_a.iter() {
        if let Some(other) = holdings_b.get(&holding.symbol) {
            let overlap = holding.weight.min(other.weight);
            total += overlap;
            result.shared.push(SharedHolding {
                symbol: holding.symbol.clone(),
                name: holding.name.clone().or_else(|| other.name.clone()),
                weight_a: holding.weight,
                weight_b: other.weight,
                overlap,
            });
        }
    }

    result.shared.sort_by(|x, y| {
        y.overlap
            .total_cmp(&x.overlap)
            .then_with(|| x.symbol.cmp(&y.symbol))
    });

    result.overlap = total.clamp(0.0, 100.0);
    result.band = thresholds.classify(result.overlap);
    result.coverage_a = coverage(result.overlap, holdings_a.total_weight());
    result.coverage_b = coverage(result.overlap, holdings_b.total_weight());
    result.note = partial_holdings_note(holdings_a, holdings_b);

    debug!(
        fund_a = %result.fund_a,
        fund_b = %result.fund_b,
        shared = result.shared.len(),
        overlap = result.overlap,
        "Computed overlap"
    );

    result
}

fn partial_holdings_note(holdings_a: &HoldingsSet, holdings_b: &HoldingsSet) -> Option<String> {
    let mut partial: Vec<String> = [holdings_a, holdings_b]
        .into_iter()
        .filter(|h| !h.is_complete(COMPLETE_TOLERANCE) && h.total_weight() < 100.0)
        .map(|h| format!("{} ({:.2}%)", h.fund, h.total_weight()))
        .collect();
    partial.dedup();
    if partial.is_empty() {
        return None;
    }
    Some(format!(
        "Only part of the portfolio is listed for {}; the overlap covers listed holdings only and understates the full overlap.",
        partial.join(" and ")
    ))
}

fn coverage(overlap: f64, total: f64) -> f64 {
    if total > 0.0 {
        (overlap / total * 100.0).min(100.0)
    } else {
        0.0
    }
}
