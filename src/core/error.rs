//! Error taxonomy shared by the data providers and the calculators.

use std::fmt::Display;
use thiserror::Error;

/// The provider call an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Holdings,
    PriceHistory,
    Dividends,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Operation::Holdings => "holdings",
                Operation::PriceHistory => "price history",
                Operation::Dividends => "dividends",
            }
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("Ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("{operation} for {ticker} unavailable after {attempts} attempt(s): {reason}")]
    DataUnavailable {
        ticker: String,
        operation: Operation,
        attempts: u32,
        reason: String,
    },

    #[error(
        "Insufficient data for {symbol}: requested {requested_years} year(s), {available_years:.1} available"
    )]
    InsufficientData {
        symbol: String,
        requested_years: u32,
        available_years: f64,
    },

    #[error("Malformed {operation} response for {ticker}: {detail}")]
    MalformedResponse {
        ticker: String,
        operation: Operation,
        detail: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Retryable failure. Only produced inside providers; `with_retry` turns it
    /// into `DataUnavailable` once attempts run out.
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl DataError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Transient(_))
    }

    pub fn malformed(ticker: &str, operation: Operation, detail: impl Display) -> Self {
        DataError::MalformedResponse {
            ticker: ticker.to_string(),
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn not_found(ticker: &str) -> Self {
        DataError::TickerNotFound {
            ticker: ticker.to_string(),
        }
    }
}
