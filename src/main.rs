use clap::{Parser, Subcommand};
use etfx::cli::{setup, ui};
use etfx::core::log::init_logging;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for etfx::AppCommand {
    fn from(cmd: Commands) -> etfx::AppCommand {
        match cmd {
            Commands::Menu => etfx::AppCommand::Menu,
            Commands::Overlap { fund_a, fund_b } => etfx::AppCommand::Overlap { fund_a, fund_b },
            Commands::Growth { symbols, years } => etfx::AppCommand::Growth { symbols, years },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Interactive menu (default when no command is given)
    Menu,
    /// Show how much two ETFs hold in common
    Overlap {
        /// First ETF symbol
        fund_a: String,
        /// Second ETF symbol
        fund_b: String,
    },
    /// Compound annual growth rate and average dividend yield
    Growth {
        /// ETF symbols, separated by spaces or commas
        #[arg(required = true, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Lookback in years (defaults to `default_years` from the config)
        #[arg(short, long)]
        years: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup::setup(),
        Some(cmd) => etfx::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => etfx::run_command(etfx::AppCommand::Menu, cli.config_path.as_deref()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            eprintln!("{}", ui::style_text(&ui::error_message(&e), ui::StyleType::Error));
            ExitCode::FAILURE
        }
    }
}
