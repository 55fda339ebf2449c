use super::{input, ui};
use crate::core::error::DataError;
use crate::core::growth::{GrowthResult, compute_growth};
use crate::core::history::HistoryProvider;
use anyhow::{Result, anyhow};
use comfy_table::{Cell, Table};
use futures::future::join_all;
use tracing::{debug, info};

/// Outcome for one requested symbol.
pub type SymbolGrowth = (String, Result<GrowthResult, DataError>);

pub async fn run<S: AsRef<str>>(
    symbols: &[S],
    years: u32,
    provider: &dyn HistoryProvider,
) -> Result<Vec<SymbolGrowth>> {
    let symbols = input::parse_symbols(symbols)?;
    if years == 0 {
        return Err(DataError::InvalidInput("Lookback must be at least one year".to_string()).into());
    }
    info!("Calculating {years}Y growth for {}", symbols.join(", "));

    let pb = ui::new_progress_bar(symbols.len() as u64);
    pb.set_message("Fetching price history...");
    let results = compute_all(&symbols, years, provider, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    println!("\n{}", growth_table(&results, years));
    for (symbol, result) in &results {
        if let Err(e) = result {
            println!(
                "{}",
                ui::style_text(
                    &format!("{symbol}: {}", ui::data_error_message(e)),
                    ui::StyleType::Error
                )
            );
        }
    }

    if results.iter().all(|(_, r)| r.is_err()) {
        return Err(anyhow!(
            "No growth figures could be calculated for {}",
            symbols.join(", ")
        ));
    }
    Ok(results)
}

/// Fetches and computes every symbol concurrently. Results keep the order of
/// `symbols`.
pub async fn compute_all(
    symbols: &[String],
    years: u32,
    provider: &dyn HistoryProvider,
    update_callback: &(dyn Fn() + Sync),
) -> Vec<SymbolGrowth> {
    let futures = symbols.iter().map(|symbol| async move {
        let result = compute_one(symbol, years, provider).await;
        if let Err(e) = &result {
            debug!("Growth calculation failed for {}: {}", symbol, e);
        }
        update_callback();
        (symbol.clone(), result)
    });

    join_all(futures).await
}

async fn compute_one(
    symbol: &str,
    years: u32,
    provider: &dyn HistoryProvider,
) -> Result<GrowthResult, DataError> {
    let (prices, dividends) = provider.fetch_history(symbol, years).await?;
    compute_growth(&prices, &dividends, years)
}

/// One row per requested symbol; failures show N/A.
pub fn growth_table(results: &[SymbolGrowth], years: u32) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell(&format!("CAGR {years}Y (%) [Total Return]")),
        ui::header_cell(&format!("Avg Dividend Yield {years}Y (%)")),
    ]);

    for (symbol, result) in results {
        let row = match result {
            Ok(growth) => vec![
                Cell::new(symbol),
                ui::change_cell(growth.cagr),
                ui::weight_cell(growth.average_dividend_yield * 100.0),
            ],
            Err(_) => vec![Cell::new(symbol), ui::na_cell(true), ui::na_cell(true)],
        };
        table.add_row(row);
    }
    table
}
