use crate::core::error::DataError;
use crate::core::overlap::OverlapBand;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Label,
    Error,
    Warning,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Label => style(text).bold(),
        StyleType::Error => style(text).red(),
        StyleType::Warning => style(text).yellow(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Colors a value by overlap band: green for low, yellow for medium, red for high.
pub fn style_band(text: &str, band: OverlapBand) -> String {
    let styled = match band {
        OverlapBand::Low => style(text).green().bold(),
        OverlapBand::Medium => style(text).yellow().bold(),
        OverlapBand::High => style(text).red().bold(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Right-aligned weight in percent.
pub fn weight_cell(weight: f64) -> Cell {
    Cell::new(format!("{weight:.2}%")).set_alignment(CellAlignment::Right)
}

/// Creates a cell for a percentage change with color coding. `rate` is a
/// fraction.
pub fn change_cell(rate: f64) -> Cell {
    let text = format!("{:.2}%", rate * 100.0);
    if rate >= 0.0 {
        Cell::new(text)
            .fg(Color::Green)
            .set_alignment(CellAlignment::Right)
    } else {
        Cell::new(text)
            .fg(Color::Red)
            .set_alignment(CellAlignment::Right)
    }
}

/// Creates a cell for "N/A" values, with error-specific styling.
pub fn na_cell(has_error: bool) -> Cell {
    let color = if has_error {
        Color::Red
    } else {
        Color::DarkGrey
    };
    Cell::new("N/A")
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// User-facing explanation for a provider or calculation failure.
pub fn data_error_message(err: &DataError) -> String {
    match err {
        DataError::TickerNotFound { ticker } => {
            format!("Ticker {ticker} was not found. Please check the symbol and enter it again.")
        }
        DataError::DataUnavailable { .. } | DataError::Transient(_) => {
            format!("{err}. Please try again later.")
        }
        DataError::InsufficientData {
            symbol,
            requested_years,
            available_years,
        } => format!(
            "Not enough history for {symbol}: {requested_years} year(s) requested, at most {available_years:.1} available."
        ),
        DataError::MalformedResponse { .. } => {
            error!(error = %err, "Provider returned an unexpected response");
            "The data provider returned an unexpected response. Please try again later."
                .to_string()
        }
        DataError::InvalidInput(message) => message.clone(),
    }
}

/// User-facing message for any command failure.
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<DataError>() {
        Some(data_error) => data_error_message(data_error),
        None => format!("{err:#}"),
    }
}
