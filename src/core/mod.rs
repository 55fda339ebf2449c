//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod growth;
pub mod history;
pub mod holdings;
pub mod log;
pub mod overlap;

// Re-export main types for cleaner imports
pub use error::{DataError, Operation};
pub use growth::{GrowthResult, compute_growth};
pub use history::{DividendPoint, DividendSeries, HistoryProvider, PricePoint, PriceSeries};
pub use holdings::{Holding, HoldingsProvider, HoldingsSet, normalize_symbol};
pub use overlap::{OverlapBand, OverlapResult, OverlapThresholds, SharedHolding, compute_overlap};
