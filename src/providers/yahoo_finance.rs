use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Months, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument};

use super::util::{
    ProviderLabel, RetryPolicy, build_client, get_text, request_error, with_retry,
};
use crate::core::error::{DataError, Operation};
use crate::core::history::{
    DividendPoint, DividendSeries, HistoryProvider, PricePoint, PriceSeries,
};
use crate::core::holdings::{HoldingsProvider, HoldingsSet};

/// Extra history requested before the window so the first close on or after
/// the anniversary is included.
const HISTORY_PADDING_DAYS: i64 = 14;

const YAHOO: ProviderLabel = ProviderLabel {
    name: "Yahoo Finance",
    auth_hint: "the session cookie or crumb was not accepted; try again later or set holdings_source: fmp",
};

// YahooFinanceProvider implementation for HistoryProvider and HoldingsProvider
pub struct YahooFinanceProvider {
    base_url: String,
    cookie_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    /// quoteSummary crumb, fetched on first use and kept for the session.
    crumb: OnceCell<String>,
}

impl YahooFinanceProvider {
    pub fn new(
        base_url: &str,
        cookie_url: &str,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.to_string(),
            client: build_client(timeout)?,
            retry,
            crumb: OnceCell::new(),
        })
    }

    async fn crumb(&self, ticker: &str) -> Result<&str, DataError> {
        self.crumb
            .get_or_try_init(|| self.fetch_crumb(ticker))
            .await
            .map(String::as_str)
    }

    /// Obtains a session cookie, then the crumb bound to it.
    async fn fetch_crumb(&self, ticker: &str) -> Result<String, DataError> {
        let op = Operation::Holdings;

        // The cookie endpoint answers 404 but still sets the cookie.
        debug!("Requesting Yahoo session cookie from {}", self.cookie_url);
        with_retry(&self.retry, ticker, op, || async move {
            self.client
                .get(&self.cookie_url)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| request_error(e, ticker, op))
        })
        .await?;

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let crumb = with_retry(&self.retry, ticker, op, || {
            get_text(&self.client, &url, ticker, op, YAHOO)
        })
        .await
        .map_err(|e| match e {
            DataError::TickerNotFound { .. } => {
                DataError::malformed(ticker, op, "crumb endpoint not found")
            }
            other => other,
        })?;

        let crumb = crumb.trim();
        if crumb.is_empty() || crumb.contains(|c: char| c.is_whitespace() || c == '<') {
            return Err(DataError::DataUnavailable {
                ticker: ticker.to_string(),
                operation: op,
                attempts: 1,
                reason: "Yahoo Finance did not issue a session crumb".to_string(),
            });
        }
        debug!("Obtained Yahoo session crumb");
        Ok(crumb.to_string())
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        ticker: &str,
        operation: Operation,
    ) -> Result<T, DataError> {
        let text = with_retry(&self.retry, ticker, operation, || {
            get_text(&self.client, url, ticker, operation, YAHOO)
        })
        .await?;

        serde_json::from_str(&text).map_err(|e| {
            error!(
                error = ?e,
                response = %text,
                "Failed to parse Yahoo {} response", operation
            );
            DataError::malformed(ticker, operation, e)
        })
    }

    async fn fetch_chart(
        &self,
        ticker: &str,
        years: u32,
        operation: Operation,
    ) -> Result<ChartItem, DataError> {
        let now = Utc::now();
        let period1 = now
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .map(|start| start - ChronoDuration::days(HISTORY_PADDING_DAYS))
            .ok_or_else(|| DataError::InvalidInput(format!("Lookback of {years} years is too long")))?;

        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div&includeAdjustedClose=true",
            self.base_url,
            ticker,
            period1.timestamp(),
            now.timestamp()
        );

        let data: YahooChartResponse = self.fetch_json(&url, ticker, operation).await?;
        if let Some(err) = &data.chart.error {
            return Err(yahoo_error(err, ticker, operation));
        }

        data.chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::not_found(ticker))
    }
}

#[derive(Deserialize, Debug)]
struct YahooError {
    code: String,
    description: Option<String>,
}

fn yahoo_error(err: &YahooError, ticker: &str, operation: Operation) -> DataError {
    if err.code.eq_ignore_ascii_case("Not Found") {
        DataError::not_found(ticker)
    } else {
        DataError::malformed(
            ticker,
            operation,
            format!(
                "{}: {}",
                err.code,
                err.description.as_deref().unwrap_or("no description")
            ),
        )
    }
}

fn timestamp_to_date(ts: i64, ticker: &str, operation: Operation) -> Result<NaiveDate, DataError> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::malformed(ticker, operation, format!("invalid timestamp {ts}")))
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
    events: Option<ChartEvents>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartEvents {
    dividends: Option<HashMap<String, DividendEvent>>,
}

#[derive(Deserialize, Debug)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

impl ChartItem {
    /// Adjusted closes when present, raw closes otherwise.
    fn closes(&self) -> Option<&Vec<Option<f64>>> {
        let indicators = self.indicators.as_ref()?;
        indicators
            .adjclose
            .as_ref()
            .and_then(|a| a.first())
            .and_then(|a| a.adjclose.as_ref())
            .or_else(|| indicators.quote.first().and_then(|q| q.close.as_ref()))
    }

    fn price_points(&self, ticker: &str) -> Result<Vec<PricePoint>, DataError> {
        let op = Operation::PriceHistory;
        let (timestamps, closes) = match (self.timestamp.as_ref(), self.closes()) {
            (Some(ts), Some(closes)) => (ts, closes),
            _ => return Ok(Vec::new()),
        };
        if timestamps.len() != closes.len() {
            return Err(DataError::malformed(
                ticker,
                op,
                format!(
                    "{} timestamps but {} closes",
                    timestamps.len(),
                    closes.len()
                ),
            ));
        }

        let mut points = Vec::with_capacity(timestamps.len());
        for (ts, close) in timestamps.iter().zip(closes) {
            // Halted sessions come back as null closes.
            let Some(close) = close else { continue };
            if !close.is_finite() || *close < 0.0 {
                return Err(DataError::malformed(
                    ticker,
                    op,
                    format!("invalid close {close} at {ts}"),
                ));
            }
            points.push(PricePoint {
                date: timestamp_to_date(*ts, ticker, op)?,
                adjusted_close: *close,
            });
        }
        Ok(points)
    }

    fn dividend_points(&self, ticker: &str) -> Result<Vec<DividendPoint>, DataError> {
        let op = Operation::Dividends;
        let Some(dividends) = self.events.as_ref().and_then(|e| e.dividends.as_ref()) else {
            return Ok(Vec::new());
        };

        dividends
            .values()
            .map(|d| {
                if !d.amount.is_finite() || d.amount < 0.0 {
                    return Err(DataError::malformed(
                        ticker,
                        op,
                        format!("invalid dividend amount {}", d.amount),
                    ));
                }
                Ok(DividendPoint {
                    date: timestamp_to_date(d.date, ticker, op)?,
                    amount: d.amount,
                })
            })
            .collect()
    }
}

impl ChartItem {
    fn price_series(&self, ticker: &str) -> Result<PriceSeries, DataError> {
        let points = self.price_points(ticker)?;
        if points.is_empty() {
            return Err(DataError::not_found(ticker));
        }
        debug!("Fetched {} closes for {}", points.len(), ticker);
        Ok(PriceSeries::new(ticker, points))
    }

    fn dividend_series(&self, ticker: &str) -> Result<DividendSeries, DataError> {
        let points = self.dividend_points(ticker)?;
        debug!("Fetched {} dividends for {}", points.len(), ticker);
        Ok(DividendSeries::new(ticker, points))
    }
}

#[async_trait]
impl HistoryProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooPriceHistoryFetch",
        skip(self),
        fields(symbol = %ticker)
    )]
    async fn fetch_price_history(
        &self,
        ticker: &str,
        years: u32,
    ) -> Result<PriceSeries, DataError> {
        self.fetch_chart(ticker, years, Operation::PriceHistory)
            .await?
            .price_series(ticker)
    }

    #[instrument(
        name = "YahooDividendsFetch",
        skip(self),
        fields(symbol = %ticker)
    )]
    async fn fetch_dividends(&self, ticker: &str, years: u32) -> Result<DividendSeries, DataError> {
        self.fetch_chart(ticker, years, Operation::Dividends)
            .await?
            .dividend_series(ticker)
    }

    /// One chart request carries both closes and dividend events.
    #[instrument(
        name = "YahooHistoryFetch",
        skip(self),
        fields(symbol = %ticker)
    )]
    async fn fetch_history(
        &self,
        ticker: &str,
        years: u32,
    ) -> Result<(PriceSeries, DividendSeries), DataError> {
        let item = self.fetch_chart(ticker, years, Operation::PriceHistory).await?;
        Ok((item.price_series(ticker)?, item.dividend_series(ticker)?))
    }
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Deserialize, Debug)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryItem>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryItem {
    #[serde(rename = "topHoldings")]
    top_holdings: Option<TopHoldings>,
}

#[derive(Deserialize, Debug)]
struct TopHoldings {
    #[serde(default)]
    holdings: Vec<YahooHolding>,
}

#[derive(Deserialize, Debug)]
struct YahooHolding {
    symbol: String,
    #[serde(rename = "holdingName")]
    holding_name: Option<String>,
    #[serde(rename = "holdingPercent")]
    holding_percent: RawValue,
}

#[derive(Deserialize, Debug)]
struct RawValue {
    raw: f64,
}

#[async_trait]
impl HoldingsProvider for YahooFinanceProvider {
    /// Yahoo only lists a fund's largest positions, so the set is usually
    /// well short of 100%.
    #[instrument(
        name = "YahooHoldingsFetch",
        skip(self),
        fields(symbol = %ticker)
    )]
    async fn fetch_holdings(&self, ticker: &str) -> Result<HoldingsSet, DataError> {
        let op = Operation::Holdings;
        let crumb = self.crumb(ticker).await?;
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v10/finance/quoteSummary/{}", self.base_url, ticker),
            &[("modules", "topHoldings"), ("crumb", crumb)],
        )
        .map_err(|e| DataError::InvalidInput(format!("Invalid Yahoo Finance URL: {e}")))?;

        let data: QuoteSummaryResponse = self.fetch_json(url.as_str(), ticker, op).await?;
        if let Some(err) = &data.quote_summary.error {
            return Err(yahoo_error(err, ticker, op));
        }

        let item = data
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::not_found(ticker))?;

        let mut set = HoldingsSet::new(ticker);
        for holding in item.top_holdings.map(|t| t.holdings).unwrap_or_default() {
            let fraction = holding.holding_percent.raw;
            if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                return Err(DataError::malformed(
                    ticker,
                    op,
                    format!("weight {fraction} for {} out of range", holding.symbol),
                ));
            }
            set.insert(&holding.symbol, holding.holding_name, fraction * 100.0);
        }

        debug!("Fetched {} holdings for {}", set.len(), ticker);
        Ok(set)
    }
}
