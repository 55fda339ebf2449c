use super::{input, ui};
use crate::core::holdings::HoldingsProvider;
use crate::core::overlap::{OverlapBand, OverlapResult, OverlapThresholds, compute_overlap};
use anyhow::Result;
use comfy_table::Cell;
use std::fmt::Write;
use tracing::{debug, info};

/// Shared holdings listed under the headline figure.
const MAX_SHARED_ROWS: usize = 25;

pub async fn run(
    fund_a: &str,
    fund_b: &str,
    provider: &dyn HoldingsProvider,
    thresholds: &OverlapThresholds,
) -> Result<OverlapResult> {
    let fund_a = input::parse_ticker(fund_a)?;
    let fund_b = input::parse_ticker(fund_b)?;
    info!("Comparing holdings of {fund_a} and {fund_b}");

    let holdings_a = provider.fetch_holdings(&fund_a).await?;
    let holdings_b = provider.fetch_holdings(&fund_b).await?;
    debug!(
        "{} lists {} holdings, {} lists {}",
        holdings_a.fund,
        holdings_a.len(),
        holdings_b.fund,
        holdings_b.len()
    );

    let result = compute_overlap(&holdings_a, &holdings_b, thresholds);
    info!(
        "Total overlap weight: {:.2}% | {}",
        result.overlap,
        explanation(result.band)
    );

    println!("{}", render_overlap(&result));
    Ok(result)
}

pub fn explanation(band: OverlapBand) -> &'static str {
    match band {
        OverlapBand::Low => "Low overlap: the funds diversify each other well.",
        OverlapBand::Medium => {
            "Moderate overlap: balanced diversification with some common holdings."
        }
        OverlapBand::High => {
            "High overlap: mostly the same holdings, limited risk reduction."
        }
    }
}

/// Renders the headline overlap, its explanation and the shared holdings.
pub fn render_overlap(result: &OverlapResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}",
        ui::style_text(
            &format!("Overlap: {} vs {}", result.fund_a, result.fund_b),
            ui::StyleType::Title
        )
    );
    let _ = writeln!(
        out,
        "{} {} ({})",
        ui::style_text("Total overlap weight:", ui::StyleType::Label),
        ui::style_band(&format!("{:.2}%", result.overlap), result.band),
        result.band
    );
    let _ = writeln!(out, "{}", explanation(result.band));
    if let Some(note) = &result.note {
        let _ = writeln!(out, "{}", ui::style_text(note, ui::StyleType::Warning));
    }

    if let Some(warning) = &result.warning {
        let _ = writeln!(out, "{}", ui::style_text(warning, ui::StyleType::Warning));
        return out;
    }

    let _ = writeln!(
        out,
        "{}",
        ui::style_text(
            &format!(
                "Shared weight is {:.2}% of {}'s listed holdings and {:.2}% of {}'s.",
                result.coverage_a, result.fund_a, result.coverage_b, result.fund_b
            ),
            ui::StyleType::Subtle
        )
    );

    if result.shared.is_empty() {
        let _ = writeln!(out, "No common holdings.");
        return out;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell(&result.fund_a),
        ui::header_cell(&result.fund_b),
        ui::header_cell("Overlap"),
    ]);
    for shared in result.shared.iter().take(MAX_SHARED_ROWS) {
        table.add_row(vec![
            Cell::new(&shared.symbol),
            Cell::new(shared.name.as_deref().unwrap_or("")),
            ui::weight_cell(shared.weight_a),
            ui::weight_cell(shared.weight_b),
            ui::weight_cell(shared.overlap),
        ]);
    }
    let _ = writeln!(out, "{table}");

    if result.shared.len() > MAX_SHARED_ROWS {
        let _ = writeln!(
            out,
            "{}",
            ui::style_text(
                &format!(
                    "... and {} more shared holdings",
                    result.shared.len() - MAX_SHARED_ROWS
                ),
                ui::StyleType::Subtle
            )
        );
    }
    out
}
