//! Decide and forecast commands

use super::output::{print_decision, print_forecast, print_json};
use crate::engine::RiskEngine;
use crate::signal::Signal;
use chrono::{Duration, Utc};
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Trading pair, e.g. BTCZAR
    pub pair: String,

    /// BUY, SELL or HOLD
    pub signal: Signal,

    /// Model confidence in [0, 1]
    #[arg(long)]
    pub confidence: Decimal,

    /// Highest class probability reported by the model
    #[arg(long)]
    pub max_probability: Option<Decimal>,
}

impl DecideArgs {
    pub async fn execute(&self, engine: &RiskEngine, json: bool) -> anyhow::Result<()> {
        let decision = engine
            .decide(&self.pair, self.signal, self.confidence, self.max_probability)
            .await?;

        match (decision, json) {
            (Some(d), true) => print_json(&d)?,
            (Some(d), false) => print_decision(&d),
            (None, true) => print_json(&serde_json::json!({
                "pair": self.pair,
                "signal": self.signal,
                "decision": null,
            }))?,
            (None, false) => println!("No trade for {} {}", self.pair, self.signal),
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ForecastArgs {
    /// Trading pair, e.g. BTCZAR
    pub pair: String,

    /// Show stored forecasts from the last N hours instead of refreshing
    #[arg(long)]
    pub history_hours: Option<i64>,
}

impl ForecastArgs {
    pub async fn execute(&self, engine: &RiskEngine, json: bool) -> anyhow::Result<()> {
        let Some(hours) = self.history_hours else {
            let forecast = engine.forecast(&self.pair).await?;
            return if json {
                print_json(&forecast)
            } else {
                print_forecast(&forecast);
                Ok(())
            };
        };

        let now = Utc::now();
        let history = engine
            .forecast_history(&self.pair, now - Duration::hours(hours), now)
            .await?;

        if json {
            return print_json(&history);
        }
        if history.is_empty() {
            println!("No forecasts for {} in the last {}h", self.pair, hours);
        }
        for forecast in &history {
            print_forecast(forecast);
        }
        Ok(())
    }
}
