pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::{AppConfig, HoldingsSource};
use crate::core::history::HistoryProvider;
use crate::core::holdings::HoldingsProvider;
use crate::providers::RetryPolicy;
use crate::providers::fmp::FmpProvider;
use crate::providers::yahoo_finance::YahooFinanceProvider;
use anyhow::{Context, Result};
use std::io::BufReader;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Menu,
    Overlap { fund_a: String, fund_b: String },
    Growth {
        symbols: Vec<String>,
        years: Option<u32>,
    },
}

/// Loaded configuration together with the providers it selects.
pub struct App {
    pub config: AppConfig,
    pub holdings_provider: Arc<dyn HoldingsProvider>,
    pub history_provider: Arc<dyn HistoryProvider>,
}

impl App {
    pub fn new(
        config: AppConfig,
        holdings_provider: Arc<dyn HoldingsProvider>,
        history_provider: Arc<dyn HistoryProvider>,
    ) -> Self {
        App {
            config,
            holdings_provider,
            history_provider,
        }
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        let retry = RetryPolicy::from(&config.retry);
        let timeout = config.request_timeout();

        let yahoo = Arc::new(
            YahooFinanceProvider::new(
                &config.providers.yahoo.base_url,
                &config.providers.yahoo.cookie_url,
                retry.clone(),
                timeout,
            )
            .context("Failed to create Yahoo Finance client")?,
        );

        let holdings_provider: Arc<dyn HoldingsProvider> = match config.holdings_source {
            HoldingsSource::Yahoo => Arc::clone(&yahoo) as Arc<dyn HoldingsProvider>,
            HoldingsSource::Fmp => {
                let api_key = config.providers.fmp.resolve_api_key().context(
                    "holdings_source is fmp but no API key was found; set providers.fmp.api_key or FMP_API_KEY",
                )?;
                Arc::new(
                    FmpProvider::new(&config.providers.fmp.base_url, &api_key, retry, timeout)
                        .context("Failed to create FMP client")?,
                )
            }
        };
        debug!("Using {:?} for holdings", config.holdings_source);

        Ok(App::new(config, holdings_provider, yahoo))
    }

    pub async fn run(&self, command: AppCommand) -> Result<()> {
        match command {
            AppCommand::Menu => {
                let mut input = BufReader::new(std::io::stdin());
                cli::menu::run(self, &mut input).await
            }
            AppCommand::Overlap { fund_a, fund_b } => cli::overlap::run(
                &fund_a,
                &fund_b,
                self.holdings_provider.as_ref(),
                &self.config.overlap,
            )
            .await
            .map(|_| ()),
            AppCommand::Growth { symbols, years } => cli::growth::run(
                &symbols,
                years.unwrap_or(self.config.default_years),
                self.history_provider.as_ref(),
            )
            .await
            .map(|_| ()),
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("etfx starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        holdings_source = ?config.holdings_source,
        default_years = config.default_years,
        "Loaded config"
    );

    App::from_config(config)?.run(command).await
}
