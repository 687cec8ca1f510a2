//! CLI interface for risk-engine
//!
//! Provides subcommands for:
//! - `decide`: Size a signal and audit the decision
//! - `forecast`: Refresh or inspect volatility forecasts
//! - `portfolio`: Show, initialize or revalue the portfolio
//! - `decisions`: List recent decisions
//! - `approve` / `reject` / `execute`: Downstream status updates
//! - `config`: Show the effective configuration

mod decide;
mod output;
mod portfolio;
mod review;

pub use decide::{DecideArgs, ForecastArgs};
pub use portfolio::{PortfolioArgs, PortfolioCommand};
pub use review::{ApproveArgs, DecisionsArgs, ExecuteArgs, RejectArgs};

use crate::config::{Config, StorageBackend};
use crate::engine::{EngineStores, RiskEngine};
use crate::store::{MemoryStore, ParquetPriceHistory, SqliteStore};
use crate::volatility::QuasiMleEstimator;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "risk-engine")]
#[command(about = "Volatility-aware position sizing and leverage for crypto signals")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Size a trading signal and record the decision
    Decide(DecideArgs),
    /// Refresh or show volatility forecasts for a pair
    Forecast(ForecastArgs),
    /// Portfolio state
    Portfolio(PortfolioArgs),
    /// List recent decisions
    Decisions(DecisionsArgs),
    /// Record a downstream rejection
    Reject(RejectArgs),
    /// Record a downstream approval
    Approve(ApproveArgs),
    /// Confirm execution of a decision
    Execute(ExecuteArgs),
    /// Show the effective configuration
    Config,
}

/// Build the engine over the configured storage backend
pub fn build_engine(config: &Config) -> anyhow::Result<RiskEngine> {
    let stores = match config.storage.backend {
        StorageBackend::Memory => EngineStores::memory(&MemoryStore::new()),
        StorageBackend::Sqlite => {
            tracing::debug!(path = ?config.storage.sqlite_path, "Opening SQLite store");
            EngineStores::sqlite(&SqliteStore::open(&config.storage.sqlite_path)?)
        }
    };

    let stores = match &config.storage.price_data_dir {
        Some(dir) => {
            let prices = ParquetPriceHistory::new(dir);
            tracing::debug!(dir = ?prices.dir(), "Reading prices from Parquet");
            stores.with_prices(Arc::new(prices))
        }
        None => stores,
    };

    Ok(RiskEngine::from_config(
        config,
        stores,
        Arc::new(QuasiMleEstimator::default()),
    ))
}
