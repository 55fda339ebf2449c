use std::fs;
use tracing::{error, info};

mod test_utils {
    use chrono::{NaiveDate, TimeZone, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn mount(server: &MockServer, url_path: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    /// quoteSummary body listing `holdings` as (symbol, fraction) pairs.
    pub fn top_holdings_response(holdings: &[(&str, f64)]) -> String {
        let items: Vec<String> = holdings
            .iter()
            .map(|(symbol, fraction)| {
                format!(
                    r#"{{"symbol": "{symbol}", "holdingName": "{symbol} Inc", "holdingPercent": {{"raw": {fraction}, "fmt": "{:.2}%"}}}}"#,
                    fraction * 100.0
                )
            })
            .collect();
        format!(
            r#"{{"quoteSummary": {{"result": [{{"topHoldings": {{"holdings": [{}]}}}}], "error": null}}}}"#,
            items.join(", ")
        )
    }

    pub fn ts(date: NaiveDate) -> i64 {
        Utc.from_utc_datetime(&date.and_hms_opt(14, 30, 0).unwrap())
            .timestamp()
    }

    /// Chart body with adjusted closes and dividends, both as (date, value).
    pub fn chart_response(closes: &[(NaiveDate, f64)], dividends: &[(NaiveDate, f64)]) -> String {
        let timestamps: Vec<String> = closes.iter().map(|(d, _)| ts(*d).to_string()).collect();
        let values: Vec<String> = closes.iter().map(|(_, c)| c.to_string()).collect();
        let events: Vec<String> = dividends
            .iter()
            .map(|(d, amount)| format!(r#""{0}": {{"amount": {amount}, "date": {0}}}"#, ts(*d)))
            .collect();
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{ "currency": "USD" }},
                        "timestamp": [{ts}],
                        "events": {{ "dividends": {{ {events} }} }},
                        "indicators": {{
                            "quote": [{{ "close": [{values}] }}],
                            "adjclose": [{{ "adjclose": [{values}] }}]
                        }}
                    }}],
                    "error": null
                }}
            }}"#,
            ts = timestamps.join(", "),
            events = events.join(", "),
            values = values.join(", "),
        )
    }
}

/// Writes a config pointing both providers at `base_url` with instant retries.
fn write_config(base_url: &str, extra: &str) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
providers:
  yahoo:
    base_url: {base_url}
    cookie_url: {base_url}/cookie
  fmp:
    base_url: {base_url}
retry:
  max_attempts: 2
  initial_delay_ms: 0
  backoff_factor: 1.0
  max_delay_ms: 0
request_timeout_secs: 5
{extra}
"#
    );
    fs::write(config_file.path(), config_content).expect("Failed to write config file");
    config_file
}

fn load_app(config_file: &tempfile::NamedTempFile) -> etfx::App {
    let config = etfx::core::config::AppConfig::load_from_path(config_file.path())
        .expect("Failed to load config");
    etfx::App::from_config(config).expect("Failed to build app")
}

async fn mount_session(server: &wiremock::MockServer) {
    test_utils::mount(server, "/cookie", 404, "").await;
    test_utils::mount(server, "/v1/test/getcrumb", 200, "crumb-123").await;
}

async fn mount_two_funds(server: &wiremock::MockServer) {
    mount_session(server).await;
    test_utils::mount(
        server,
        "/v10/finance/quoteSummary/AAA",
        200,
        &test_utils::top_holdings_response(&[("AAPL", 0.07), ("MSFT", 0.06), ("NVDA", 0.05)]),
    )
    .await;
    test_utils::mount(
        server,
        "/v10/finance/quoteSummary/BBB",
        200,
        &test_utils::top_holdings_response(&[("AAPL", 0.07), ("MSFT", 0.04), ("GOOG", 0.03)]),
    )
    .await;
}

#[test_log::test(tokio::test)]
async fn test_overlap_flow_with_yahoo_mock() {
    let mock_server = wiremock::MockServer::start().await;
    mount_two_funds(&mock_server).await;
    let config_file = write_config(&mock_server.uri(), "");

    let result = etfx::run_command(
        etfx::AppCommand::Overlap {
            fund_a: "aaa".to_string(),
            fund_b: "BBB".to_string(),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Overlap failed with: {:?}", result.err());

    let app = load_app(&config_file);
    let overlap = etfx::cli::overlap::run(
        "AAA",
        "BBB",
        app.holdings_provider.as_ref(),
        &app.config.overlap,
    )
    .await
    .unwrap();
    assert!((overlap.overlap - 11.0).abs() < 1e-9);
    assert_eq!(overlap.band, etfx::core::OverlapBand::Low);
    assert_eq!(overlap.shared.len(), 2);
    assert_eq!(overlap.shared[0].symbol, "AAPL");
    assert!(overlap.note.unwrap().contains("listed holdings only"));
}

#[test_log::test(tokio::test)]
async fn test_growth_flow_with_yahoo_mock() {
    use chrono::{Duration, Months, Utc};

    let end = Utc::now().date_naive() - Duration::days(1);
    let start = end.checked_sub_months(Months::new(60)).unwrap() + Duration::days(2);
    let middle = end.checked_sub_months(Months::new(24)).unwrap();
    let payout = end.checked_sub_months(Months::new(12)).unwrap();

    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount(
        &mock_server,
        "/v8/finance/chart/SCHD",
        200,
        &test_utils::chart_response(
            &[(start, 100.0), (middle, 150.0), (end, 200.0)],
            &[(payout, 5.0)],
        ),
    )
    .await;
    let config_file = write_config(&mock_server.uri(), "");

    let result = etfx::run_command(
        etfx::AppCommand::Growth {
            symbols: vec!["schd".to_string()],
            years: Some(5),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Growth failed with: {:?}", result.err());

    let app = load_app(&config_file);
    let results = etfx::cli::growth::run(&["SCHD"], 5, app.history_provider.as_ref())
        .await
        .unwrap();
    let growth = results[0].1.as_ref().unwrap();
    assert!((growth.cagr - 0.1487).abs() < 1e-4);
    assert_eq!(growth.total_dividends, 5.0);
    assert!((growth.average_dividend_yield - 1.0 / 150.0).abs() < 1e-12);
    assert_eq!(growth.start_date, start);
    assert_eq!(growth.end_date, end);
}

#[test_log::test(tokio::test)]
async fn test_growth_with_short_history_reports_insufficient_data() {
    use chrono::{Duration, Utc};

    let end = Utc::now().date_naive() - Duration::days(1);
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount(
        &mock_server,
        "/v8/finance/chart/NEW",
        200,
        &test_utils::chart_response(&[(end - Duration::days(400), 20.0), (end, 25.0)], &[]),
    )
    .await;
    let config_file = write_config(&mock_server.uri(), "");

    let result = etfx::run_command(
        etfx::AppCommand::Growth {
            symbols: vec!["NEW".to_string()],
            years: Some(5),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());

    let app = load_app(&config_file);
    let results = etfx::cli::growth::compute_all(
        &["NEW".to_string()],
        5,
        app.history_provider.as_ref(),
        &|| (),
    )
    .await;
    match &results[0].1 {
        Err(etfx::core::DataError::InsufficientData {
            available_years, ..
        }) => assert!((available_years - 400.0 / 365.25).abs() < 1e-9),
        other => panic!("Expected insufficient data, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_unknown_ticker_is_reported() {
    let mock_server = wiremock::MockServer::start().await;
    mount_two_funds(&mock_server).await;
    test_utils::mount(
        &mock_server,
        "/v10/finance/quoteSummary/ZZZZ",
        404,
        r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: ZZZZ"}}}"#,
    )
    .await;
    let config_file = write_config(&mock_server.uri(), "");

    let err = etfx::run_command(
        etfx::AppCommand::Overlap {
            fund_a: "AAA".to_string(),
            fund_b: "ZZZZ".to_string(),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<etfx::core::DataError>(),
        Some(etfx::core::DataError::TickerNotFound { ticker }) if ticker == "ZZZZ"
    ));
    assert!(etfx::cli::ui::error_message(&err).contains("ZZZZ was not found"));
}

#[test_log::test(tokio::test)]
async fn test_transient_failure_is_retried() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    let mock_server = wiremock::MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAA"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    mount_two_funds(&mock_server).await;
    let config_file = write_config(&mock_server.uri(), "");

    let result = etfx::run_command(
        etfx::AppCommand::Overlap {
            fund_a: "AAA".to_string(),
            fund_b: "BBB".to_string(),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Overlap failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_exhausted_retries_report_unavailable() {
    let mock_server = wiremock::MockServer::start().await;
    mount_session(&mock_server).await;
    test_utils::mount(&mock_server, "/v10/finance/quoteSummary/AAA", 503, "").await;
    let config_file = write_config(&mock_server.uri(), "");

    let err = etfx::run_command(
        etfx::AppCommand::Overlap {
            fund_a: "AAA".to_string(),
            fund_b: "BBB".to_string(),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<etfx::core::DataError>(),
        Some(etfx::core::DataError::DataUnavailable { attempts: 2, .. })
    ));
    let requests = mock_server.received_requests().await.unwrap();
    let holdings_requests = requests
        .iter()
        .filter(|r| r.url.path() == "/v10/finance/quoteSummary/AAA")
        .count();
    assert_eq!(holdings_requests, 2);
    assert!(requests.iter().all(|r| {
        r.url.path() != "/v10/finance/quoteSummary/AAA"
            || r.url.query().is_some_and(|q| q.contains("crumb=crumb-123"))
    }));
}

#[test_log::test(tokio::test)]
async fn test_overlap_flow_with_fmp_mock() {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    let mock_server = wiremock::MockServer::start().await;
    for (fund, body) in [
        (
            "VOO",
            r#"[{"asset": "AAPL", "name": "Apple", "weightPercentage": 7.0},
                {"asset": "MSFT", "name": "Microsoft", "weightPercentage": 6.5},
                {"asset": "BRK.B", "name": "Berkshire", "weightPercentage": 1.7}]"#,
        ),
        (
            "VTI",
            r#"[{"asset": "AAPL", "name": "Apple", "weightPercentage": 6.0},
                {"asset": "MSFT", "name": "Microsoft", "weightPercentage": 5.5},
                {"asset": "BRK-B", "name": "Berkshire", "weightPercentage": 1.5}]"#,
        ),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v3/etf-holder/{fund}")))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
    }

    let config_file = write_config(&mock_server.uri(), "holdings_source: fmp");
    let mut config = etfx::core::config::AppConfig::load_from_path(config_file.path()).unwrap();
    config.providers.fmp.api_key = Some("test-key".to_string());
    let app = etfx::App::from_config(config).unwrap();

    let overlap = etfx::cli::overlap::run(
        "VOO",
        "VTI",
        app.holdings_provider.as_ref(),
        &app.config.overlap,
    )
    .await
    .unwrap();
    assert!((overlap.overlap - 13.0).abs() < 1e-9);
    assert_eq!(overlap.shared.len(), 3);
    assert!(overlap.shared.iter().any(|s| s.symbol == "BRK-B"));
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing.yaml");

    let err = etfx::run_command(etfx::AppCommand::Menu, Some(missing.to_str().unwrap()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test_log::test(tokio::test)]
#[ignore = "hits the live Yahoo Finance API"]
async fn test_real_yahoo_holdings_api() {
    use etfx::core::HoldingsProvider;

    let app = etfx::App::from_config(etfx::core::config::AppConfig::default()).unwrap();
    let fund = "SPY";
    info!(?fund, "Fetching holdings from Yahoo Finance");

    match app.holdings_provider.fetch_holdings(fund).await {
        Ok(holdings) => {
            info!(count = holdings.len(), total = holdings.total_weight(), "Received holdings");
            assert!(!holdings.is_empty(), "Holdings should not be empty");
            assert!(holdings.total_weight() <= 100.0 + 1e-6);
        }
        Err(e) => {
            error!("Holdings request failed: {e}\n{e:?}");
            panic!("Holdings request failed: {e}");
        }
    }
}

#[test_log::test(tokio::test)]
#[ignore = "hits the live Yahoo Finance API"]
async fn test_real_yahoo_history_api() {
    use etfx::core::HistoryProvider;

    let app = etfx::App::from_config(etfx::core::config::AppConfig::default()).unwrap();
    let symbol = "SCHD";
    info!(?symbol, "Fetching price history from Yahoo Finance");

    let prices = match app.history_provider.fetch_price_history(symbol, 5).await {
        Ok(prices) => prices,
        Err(e) => {
            error!("Price history request failed: {e}\n{e:?}");
            panic!("Price history request failed: {e}");
        }
    };
    let dividends = app
        .history_provider
        .fetch_dividends(symbol, 5)
        .await
        .expect("Dividend request failed");

    let growth = etfx::core::compute_growth(&prices, &dividends, 5).unwrap();
    info!(?growth, "Computed growth from live data");
    assert!(growth.average_dividend_yield > 0.0);
    assert!(growth.start_price > 0.0);
}
