//! Compound annual growth and dividend yield over a lookback window.
use crate::core::error::DataError;
use crate::core::history::{DividendSeries, PricePoint, PriceSeries};
use chrono::{Duration, Months, NaiveDate};
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use tracing::debug;

/// Days a series may start after the window start and still cover it. The
/// exact anniversary often falls on a weekend or market holiday.
pub const HISTORY_GRACE_DAYS: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthResult {
    pub symbol: String,
    pub years: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_price: f64,
    pub end_price: f64,
    /// Fraction, may be negative: 0.1487 is 14.87% a year.
    pub cagr: f64,
    /// Fraction: annual distributions over the mean price of the window.
    pub average_dividend_yield: f64,
    pub total_dividends: f64,
}

/// Computes CAGR and average dividend yield over the last `years` years of
/// `prices`.
///
/// The window ends at the latest close and starts at the first close on or
/// after the same date `years` years earlier. Dividends paid after the start
/// close up to the end close are annualized and divided by the mean close of
/// the window. A fund without distributions yields 0.
pub fn compute_growth(
    prices: &PriceSeries,
    dividends: &DividendSeries,
    years: u32,
) -> Result<GrowthResult, DataError> {
    if years == 0 {
        return Err(DataError::InvalidInput(
            "Lookback must be at least one year".to_string(),
        ));
    }

    let points = prices.points();
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(insufficient(&prices.symbol, years, 0.0)),
    };

    let window_start = last
        .date
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .ok_or_else(|| DataError::InvalidInput(format!("Lookback of {years} years is too long")))?;

    if first.date > window_start + Duration::days(HISTORY_GRACE_DAYS) {
        return Err(insufficient(
            &prices.symbol,
            years,
            years_between(first.date, last.date),
        ));
    }

    let start_idx = points
        .iter()
        .position(|p| p.date >= window_start)
        .unwrap_or(points.len() - 1);
    let window = &points[start_idx..];
    let start = &window[0];

    if start.adjusted_close <= 0.0 {
        // Only the tail after the last non-positive close is usable.
        let usable_from = points
            .iter()
            .rposition(|p| p.adjusted_close <= 0.0)
            .and_then(|idx| points.get(idx + 1));
        let available = usable_from.map_or(0.0, |p| years_between(p.date, last.date));
        return Err(insufficient(&prices.symbol, years, available));
    }

    let rate = annual_growth_rate(start, last, years)?;

    let average_price = window.iter().map(|p| p.adjusted_close).sum::<f64>() / window.len() as f64;
    let total_dividends = dividends.total_between(start.date, last.date);
    let average_dividend_yield = if average_price > 0.0 {
        (total_dividends / years as f64) / average_price
    } else {
        0.0
    };

    debug!(
        symbol = %prices.symbol,
        start = %start.date,
        end = %last.date,
        rate,
        total_dividends,
        average_price,
        "Computed growth"
    );

    Ok(GrowthResult {
        symbol: prices.symbol.clone(),
        years,
        start_date: start.date,
        end_date: last.date,
        start_price: start.adjusted_close,
        end_price: last.adjusted_close,
        cagr: rate,
        average_dividend_yield,
        total_dividends,
    })
}

fn annual_growth_rate(start: &PricePoint, end: &PricePoint, years: u32) -> Result<f64, DataError> {
    if end.adjusted_close <= 0.0 {
        return Ok(-1.0);
    }

    let begin_bal = Decimal::from_f64(start.adjusted_close)
        .ok_or_else(|| DataError::InvalidInput("Invalid start price".to_string()))?;
    let end_bal = Decimal::from_f64(end.adjusted_close)
        .ok_or_else(|| DataError::InvalidInput("Invalid end price".to_string()))?;
    let n_years = Decimal::from(years);

    cagr(begin_bal, end_bal, n_years)
        .to_f64()
        .ok_or_else(|| DataError::InvalidInput("CAGR conversion failed".to_string()))
}

fn insufficient(symbol: &str, years: u32, available_years: f64) -> DataError {
    DataError::InsufficientData {
        symbol: symbol.to_string(),
        requested_years: years,
        available_years,
    }
}

fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / 365.25
}
