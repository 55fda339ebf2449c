//! Price and dividend history abstractions.

use crate::core::error::DataError;
use async_trait::async_trait;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adjusted_close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DividendPoint {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Daily adjusted closes, chronologically ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: &str, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            symbol: symbol.to_string(),
            points,
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Cash distributions, chronologically ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct DividendSeries {
    pub symbol: String,
    points: Vec<DividendPoint>,
}

impl DividendSeries {
    pub fn new(symbol: &str, mut points: Vec<DividendPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            symbol: symbol.to_string(),
            points,
        }
    }

    pub fn empty(symbol: &str) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn points(&self) -> &[DividendPoint] {
        &self.points
    }

    /// Sum of distributions dated in `(after, up_to]`.
    pub fn total_between(&self, after: NaiveDate, up_to: NaiveDate) -> f64 {
        self.points
            .iter()
            .filter(|p| p.date > after && p.date <= up_to)
            .map(|p| p.amount)
            .sum()
    }
}

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Daily adjusted closes covering at least the last `years` years.
    async fn fetch_price_history(&self, ticker: &str, years: u32)
    -> Result<PriceSeries, DataError>;

    async fn fetch_dividends(&self, ticker: &str, years: u32) -> Result<DividendSeries, DataError>;

    /// Prices and dividends for the same window. Providers that serve both
    /// from one response override this to skip the second request.
    async fn fetch_history(
        &self,
        ticker: &str,
        years: u32,
    ) -> Result<(PriceSeries, DividendSeries), DataError> {
        let prices = self.fetch_price_history(ticker, years).await?;
        let dividends = self.fetch_dividends(ticker, years).await?;
        Ok((prices, dividends))
    }
}
