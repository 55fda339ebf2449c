use super::{growth, input, overlap, ui};
use crate::App;
use anyhow::Result;
use comfy_table::Cell;
use std::io::{BufRead, Write};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Overlap,
    Growth,
    Quit,
}

pub fn parse_choice(raw: &str) -> Option<MenuChoice> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "overlap" => Some(MenuChoice::Overlap),
        "2" | "growth" | "cagr" => Some(MenuChoice::Growth),
        "q" | "quit" | "exit" | "3" => Some(MenuChoice::Quit),
        _ => None,
    }
}

fn print_options() {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Option"),
        ui::header_cell("Action"),
        ui::header_cell("Description"),
    ]);
    table.add_row(vec![
        Cell::new("1"),
        Cell::new("ETF Overlap"),
        Cell::new("Shows how much of two ETFs' portfolios is invested in the same companies."),
    ]);
    table.add_row(vec![
        Cell::new("2"),
        Cell::new("CAGR"),
        Cell::new("Calculates compound annual growth rate and average dividend yield."),
    ]);
    table.add_row(vec![Cell::new("q"), Cell::new("Quit"), Cell::new("")]);
    println!("{table}");
}

/// Prints `message` and reads one line. `None` at end of input.
fn prompt<R: BufRead>(input: &mut R, message: &str) -> Result<Option<String>> {
    print!("{message}");
    std::io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Runs the interactive menu until the user quits or input ends. Command
/// failures are reported and the menu is shown again.
pub async fn run<R: BufRead>(app: &App, input: &mut R) -> Result<()> {
    loop {
        print_options();
        let Some(choice) = prompt(input, "\nSelect an option (1, 2 or q): ")? else {
            break;
        };

        let outcome = match parse_choice(&choice) {
            Some(MenuChoice::Overlap) => match run_overlap(app, input).await? {
                Some(outcome) => outcome,
                None => break,
            },
            Some(MenuChoice::Growth) => match run_growth(app, input).await? {
                Some(outcome) => outcome,
                None => break,
            },
            Some(MenuChoice::Quit) => break,
            None => {
                println!(
                    "{}",
                    ui::style_text(
                        "Invalid choice. Please enter 1, 2 or q.",
                        ui::StyleType::Error
                    )
                );
                continue;
            }
        };

        if let Err(e) = outcome {
            debug!("Menu command failed: {e:?}");
            println!(
                "\n{}\n",
                ui::style_text(&ui::error_message(&e), ui::StyleType::Error)
            );
        }
    }
    Ok(())
}

/// Outer `None` means input ended; the inner result is the command outcome.
async fn run_overlap<R: BufRead>(app: &App, input: &mut R) -> Result<Option<Result<()>>> {
    let Some(fund_a) = prompt(input, "First ETF symbol: ")? else {
        return Ok(None);
    };
    let Some(fund_b) = prompt(input, "Second ETF symbol: ")? else {
        return Ok(None);
    };

    let outcome = overlap::run(
        &fund_a,
        &fund_b,
        app.holdings_provider.as_ref(),
        &app.config.overlap,
    )
    .await
    .map(|_| ());
    Ok(Some(outcome))
}

async fn run_growth<R: BufRead>(app: &App, input: &mut R) -> Result<Option<Result<()>>> {
    let Some(symbols) = prompt(input, "ETF symbols, comma separated (e.g. VOO,SCHD,QQQ): ")?
    else {
        return Ok(None);
    };
    let Some(years) = prompt(
        input,
        &format!("Lookback in years [{}]: ", app.config.default_years),
    )?
    else {
        return Ok(None);
    };

    let years = match input::parse_years(&years, app.config.default_years) {
        Ok(years) => years,
        Err(e) => return Ok(Some(Err(e.into()))),
    };
    let outcome = growth::run(&[symbols], years, app.history_provider.as_ref())
        .await
        .map(|_| ());
    Ok(Some(outcome))
}
