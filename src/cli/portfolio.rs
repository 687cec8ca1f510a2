//! Portfolio command

use super::output::{print_json, print_portfolio};
use crate::engine::RiskEngine;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct PortfolioArgs {
    #[command(subcommand)]
    pub command: PortfolioCommand,
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommand {
    /// Show the current state
    Show,
    /// Store the starting value unless a state already exists
    Init {
        /// Starting value in ZAR; defaults to the configured starting capital
        #[arg(long)]
        value: Option<Decimal>,
    },
    /// Mark the portfolio at a new total value
    Update {
        /// New total value in ZAR
        value: Decimal,
    },
}

impl PortfolioArgs {
    pub async fn execute(
        &self,
        engine: &RiskEngine,
        starting_capital: Decimal,
        json: bool,
    ) -> anyhow::Result<()> {
        let state = match &self.command {
            PortfolioCommand::Show => engine.portfolio().await?,
            PortfolioCommand::Init { value } => {
                engine
                    .initialize_portfolio(value.unwrap_or(starting_capital))
                    .await?
            }
            PortfolioCommand::Update { value } => engine.update_portfolio(*value).await?,
        };

        if json {
            print_json(&state)
        } else {
            print_portfolio(&state);
            Ok(())
        }
    }
}
