//! Financial Modeling Prep holdings provider. Unlike Yahoo it returns every
//! position of a fund, so overlap figures cover the whole portfolio.

use super::util::{ProviderLabel, RetryPolicy, build_client, get_text, with_retry};
use crate::core::error::{DataError, Operation};
use crate::core::holdings::{HoldingsProvider, HoldingsSet};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument};

#[derive(Debug, Deserialize)]
struct FmpHolding {
    asset: String,
    name: Option<String>,
    #[serde(rename = "weightPercentage")]
    weight_percentage: f64,
}

const FMP: ProviderLabel = ProviderLabel {
    name: "Financial Modeling Prep",
    auth_hint: "check providers.fmp.api_key or FMP_API_KEY",
};

pub struct FmpProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl FmpProvider {
    pub fn new(base_url: &str, api_key: &str, retry: RetryPolicy, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: build_client(timeout)?,
            retry,
        })
    }
}

#[async_trait]
impl HoldingsProvider for FmpProvider {
    #[instrument(
        name = "FmpHoldingsFetch",
        skip(self),
        fields(symbol = %ticker)
    )]
    async fn fetch_holdings(&self, ticker: &str) -> Result<HoldingsSet, DataError> {
        let op = Operation::Holdings;
        let url = format!(
            "{}/api/v3/etf-holder/{}?apikey={}",
            self.base_url, ticker, self.api_key
        );

        let response_text = with_retry(&self.retry, ticker, op, || {
            get_text(&self.client, &url, ticker, op, FMP)
        })
        .await?;

        let holdings: Vec<FmpHolding> = match serde_json::from_str(&response_text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse holdings response"
                );
                return Err(DataError::malformed(ticker, op, e));
            }
        };

        // Unknown symbols come back as an empty array rather than a 404.
        if holdings.is_empty() {
            return Err(DataError::not_found(ticker));
        }

        let mut set = HoldingsSet::new(ticker);
        for holding in holdings {
            let weight = holding.weight_percentage;
            if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
                return Err(DataError::malformed(
                    ticker,
                    op,
                    format!("weight {weight} for {} out of range", holding.asset),
                ));
            }
            set.insert(&holding.asset, holding.name, weight);
        }

        debug!(
            "Fetched {} holdings for {} totalling {:.2}%",
            set.len(),
            ticker,
            set.total_weight()
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(fund: &str, status: u16, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/api/v3/etf-holder/{fund}")))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(server: &MockServer) -> FmpProvider {
        FmpProvider::new(
            &server.uri(),
            "test-key",
            RetryPolicy::immediate(2),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_holdings_fetch() {
        let mock_response = r#"[
            { "asset": "AAPL", "name": "APPLE INC", "isin": "US0378331005", "sharesNumber": 1000, "weightPercentage": 7.05, "marketValue": 1.0, "updated": "2024-05-01" },
            { "asset": "MSFT", "name": "MICROSOFT CORP", "weightPercentage": 6.5 },
            { "asset": "BRK.B", "name": null, "weightPercentage": 1.6 }
        ]"#;
        let mock_server = create_mock_server("SPY", 200, mock_response).await;

        let holdings = provider(&mock_server).fetch_holdings("SPY").await.unwrap();
        assert_eq!(holdings.fund, "SPY");
        assert_eq!(holdings.len(), 3);
        assert_eq!(holdings.get("AAPL").unwrap().weight, 7.05);
        assert_eq!(
            holdings.get("MSFT").unwrap().name.as_deref(),
            Some("MICROSOFT CORP")
        );
        assert_eq!(holdings.get("BRK-B").unwrap().weight, 1.6);
    }

    #[tokio::test]
    async fn test_empty_array_is_not_found() {
        let mock_server = create_mock_server("NOPE", 200, "[]").await;

        let result = provider(&mock_server).fetch_holdings("NOPE").await;
        assert!(matches!(result, Err(DataError::TickerNotFound { .. })));
    }

    #[tokio::test]
    async fn test_rejected_key_is_unavailable_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/etf-holder/SPY"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .fetch_holdings("SPY")
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::DataUnavailable { attempts: 1, .. }));
        assert!(err.to_string().contains("FMP_API_KEY"));
    }

    #[tokio::test]
    async fn test_timeout_does_not_leak_api_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/etf-holder/SPY"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;
        let provider = FmpProvider::new(
            &mock_server.uri(),
            "test-key",
            RetryPolicy::immediate(2),
            Duration::from_millis(50),
        )
        .unwrap();

        let err = provider.fetch_holdings("SPY").await.unwrap_err();

        assert!(matches!(err, DataError::DataUnavailable { attempts: 2, .. }));
        assert!(!err.to_string().contains("test-key"));
        assert!(!format!("{err:?}").contains("test-key"));
    }

    #[tokio::test]
    async fn test_error_object_is_malformed() {
        let mock_response = r#"{ "Error Message": "Limit Reach" }"#;
        let mock_server = create_mock_server("SPY", 200, mock_response).await;

        let result = provider(&mock_server).fetch_holdings("SPY").await;
        assert!(matches!(
            result,
            Err(DataError::MalformedResponse {
                operation: Operation::Holdings,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_negative_weight_is_malformed() {
        let mock_response = r#"[{ "asset": "AAPL", "weightPercentage": -1.0 }]"#;
        let mock_server = create_mock_server("SPY", 200, mock_response).await;

        let result = provider(&mock_server).fetch_holdings("SPY").await;
        assert!(matches!(result, Err(DataError::MalformedResponse { .. })));
    }
}
