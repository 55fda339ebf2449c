use crate::core::config::RetryConfig;
use crate::core::error::{DataError, Operation};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total runs, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self
            .initial_delay
            .mul_f64(self.backoff_factor.powi(exponent).min(u32::MAX as f64));
        delay.min(self.max_delay)
    }
}

/// Retries an async operation while it fails with a transient error.
///
/// Permanent errors are returned as they are. Once `max_attempts` runs have
/// failed transiently the last failure is reported as `DataUnavailable` for
/// `ticker` and `operation`.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    ticker: &str,
    operation: Operation,
    mut f: F,
) -> Result<T, DataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DataError>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(DataError::Transient(reason)) => {
                if attempt >= policy.max_attempts {
                    return Err(DataError::DataUnavailable {
                        ticker: ticker.to_string(),
                        operation,
                        attempts: attempt,
                        reason,
                    });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} to fetch {} for {} failed: {}. Retrying in {:?}",
                    attempt, policy.max_attempts, operation, ticker, reason, delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Names a provider in rejected-request errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLabel {
    pub name: &'static str,
    /// Appended to 401/403 failures.
    pub auth_hint: &'static str,
}

/// Maps a non-success HTTP status to the error taxonomy.
pub fn status_error(
    status: StatusCode,
    ticker: &str,
    operation: Operation,
    provider: ProviderLabel,
) -> DataError {
    match status {
        StatusCode::NOT_FOUND => DataError::not_found(ticker),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            DataError::Transient(format!("HTTP {status}"))
        }
        s if s.is_server_error() => DataError::Transient(format!("HTTP {status}")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DataError::DataUnavailable {
            ticker: ticker.to_string(),
            operation,
            attempts: 1,
            reason: format!(
                "{} rejected the request (HTTP {status}); {}",
                provider.name, provider.auth_hint
            ),
        },
        _ => DataError::malformed(ticker, operation, format!("unexpected HTTP {status}")),
    }
}

/// Maps a transport error from reqwest to the error taxonomy. The request URL
/// is dropped since its query string may carry an API key.
pub fn request_error(err: reqwest::Error, ticker: &str, operation: Operation) -> DataError {
    let err = err.without_url();
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        debug!("Transport error for {ticker}: {err}");
        DataError::Transient(err.to_string())
    } else if err.is_decode() {
        DataError::malformed(ticker, operation, err)
    } else {
        DataError::Transient(err.to_string())
    }
}

/// Issues a GET and returns the body of a successful response.
pub async fn get_text(
    client: &reqwest::Client,
    url: &str,
    ticker: &str,
    operation: Operation,
    provider: ProviderLabel,
) -> Result<String, DataError> {
    // Query strings may carry API keys.
    let endpoint = url.split('?').next().unwrap_or(url);
    debug!("Requesting {} from {}", operation, endpoint);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| request_error(e, ticker, operation))?;

    let status = response.status();
    if !status.is_success() {
        return Err(status_error(status, ticker, operation, provider));
    }

    response
        .text()
        .await
        .map_err(|e| request_error(e, ticker, operation))
}

pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("etfx/0.1")
        .cookie_store(true)
        .timeout(timeout)
        .build()
}
