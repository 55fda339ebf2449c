//! Parsing of user-entered tickers and lookback years.

use crate::core::error::DataError;

/// Trims and uppercases a fund ticker.
pub fn parse_ticker(raw: &str) -> Result<String, DataError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(DataError::InvalidInput(
            "Ticker symbols cannot be empty".to_string(),
        ));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(DataError::InvalidInput(format!(
            "Invalid ticker symbol: {ticker}"
        )));
    }
    Ok(ticker)
}

/// Parses tickers from one or more comma-separated entries, keeping the first
/// occurrence of each in input order.
pub fn parse_symbols<S: AsRef<str>>(entries: &[S]) -> Result<Vec<String>, DataError> {
    let mut symbols: Vec<String> = Vec::new();
    for part in entries
        .iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .filter(|part| !part.trim().is_empty())
    {
        let ticker = parse_ticker(part)?;
        if !symbols.contains(&ticker) {
            symbols.push(ticker);
        }
    }

    if symbols.is_empty() {
        return Err(DataError::InvalidInput(
            "No ETF symbols entered".to_string(),
        ));
    }
    Ok(symbols)
}

/// Parses a positive number of years. Blank input falls back to `default`.
pub fn parse_years(raw: &str, default: u32) -> Result<u32, DataError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    match raw.parse::<u32>() {
        Ok(years) if years > 0 => Ok(years),
        _ => Err(DataError::InvalidInput(format!(
            "Invalid number of years: {raw}"
        ))),
    }
}
