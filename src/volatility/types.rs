//! Volatility forecast types

use super::garch::{EstimatorError, GarchParams};
use super::regime::VolatilityRegime;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Trading days per year used to annualize daily volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Why a forecast was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshTrigger {
    /// No earlier forecast existed for the pair
    Initial,
    /// The previous forecast aged past the update interval
    Scheduled,
    /// Price moved past the extreme-move threshold
    ExtremeMove,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Initial => "INITIAL",
            RefreshTrigger::Scheduled => "SCHEDULED",
            RefreshTrigger::ExtremeMove => "EXTREME_MOVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIAL" => Some(RefreshTrigger::Initial),
            "SCHEDULED" => Some(RefreshTrigger::Scheduled),
            "EXTREME_MOVE" => Some(RefreshTrigger::ExtremeMove),
            _ => None,
        }
    }
}

/// A persisted GARCH volatility forecast
///
/// Rows are append-only: a newer forecast supersedes, never overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityForecast {
    pub id: Uuid,
    pub pair: String,
    /// Next-period daily volatility on decimal scale (0.03 = 3%)
    pub daily_volatility: f64,
    /// `daily_volatility * sqrt(252)`
    pub annualized_volatility: f64,
    pub regime: VolatilityRegime,
    pub garch_omega: f64,
    pub garch_alpha: f64,
    pub garch_beta: f64,
    /// Number of log returns the fit used
    pub observations: usize,
    pub trigger: RefreshTrigger,
    pub forecast_timestamp: DateTime<Utc>,
}

impl VolatilityForecast {
    /// Build a forecast row, deriving the annualized figure
    pub fn new(
        pair: impl Into<String>,
        daily_volatility: f64,
        regime: VolatilityRegime,
        params: GarchParams,
        observations: usize,
        trigger: RefreshTrigger,
        forecast_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pair: pair.into(),
            daily_volatility,
            annualized_volatility: daily_volatility * TRADING_DAYS_PER_YEAR.sqrt(),
            regime,
            garch_omega: params.omega,
            garch_alpha: params.alpha,
            garch_beta: params.beta,
            observations,
            trigger,
            forecast_timestamp,
        }
    }

    /// Fitted parameters
    pub fn params(&self) -> GarchParams {
        GarchParams::new(self.garch_omega, self.garch_alpha, self.garch_beta)
    }

    /// Age of the forecast at `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.forecast_timestamp
    }
}

/// Volatility model errors
#[derive(Debug, Error)]
pub enum VolatilityError {
    /// Too few price observations to fit
    #[error("Insufficient data for {pair}: {observations} returns, need {required}")]
    InsufficientData {
        pair: String,
        observations: usize,
        required: usize,
    },
    /// The estimator failed or returned unusable parameters
    #[error("GARCH estimation failed: {0}")]
    Estimator(#[from] EstimatorError),
    /// Price or forecast store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
