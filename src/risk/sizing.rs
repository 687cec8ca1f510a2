//! Position sizing
//!
//! Kelly fraction, scaled for safety, volatility regime and drawdown, then
//! capped per regime and globally. Stop-loss follows daily volatility.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::decision::PositionDecision;
use super::kelly::KellyCalculator;
use super::types::RiskError;
use crate::config::SizingConfig;
use crate::signal::Signal;
use crate::volatility::VolatilityRegime;

/// Inputs to a single sizing call
#[derive(Debug, Clone)]
pub struct SizingRequest<'a> {
    pub pair: &'a str,
    pub signal: Signal,
    pub confidence: Decimal,
    pub max_probability: Option<Decimal>,
    pub portfolio_value: Decimal,
    /// Daily volatility on decimal scale (0.03 = 3%)
    pub daily_volatility: Decimal,
    pub regime: VolatilityRegime,
    pub drawdown_pct: Decimal,
}

impl SizingRequest<'_> {
    /// Fail fast on out-of-range inputs
    pub fn validate(&self) -> Result<(), RiskError> {
        RiskError::check_probability("confidence", self.confidence)?;
        if let Some(p) = self.max_probability {
            RiskError::check_probability("max_probability", p)?;
        }
        RiskError::check_non_negative("portfolio_value", self.portfolio_value)?;
        RiskError::check_non_negative("daily_volatility", self.daily_volatility)?;
        RiskError::check_non_negative("drawdown_pct", self.drawdown_pct)?;
        Ok(())
    }
}

/// Regime- and drawdown-aware Kelly position sizer
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
    kelly: KellyCalculator,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        let kelly = KellyCalculator::new(config.fractional_kelly, config.reward_risk_ratio);
        Self { config, kelly }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Size a trade, or `None` when the signal should not be traded
    ///
    /// The returned decision carries a leverage of 1.0; leverage is set by
    /// the caller.
    pub fn size(&self, request: &SizingRequest<'_>) -> Result<Option<PositionDecision>, RiskError> {
        request.validate()?;

        if !request.signal.is_directional() || request.confidence < self.config.min_confidence {
            return Ok(None);
        }

        let kelly_fraction = self.kelly.raw(request.confidence);
        let fractional_kelly = self.kelly.fractional(request.confidence);

        let regime_factor = self.config.regime_factors.get(request.regime);
        let volatility_adjusted = fractional_kelly * regime_factor;

        let drawdown_factor = self.drawdown_multiplier(request.drawdown_pct);
        let regime_cap = self.config.regime_caps.get(request.regime);
        let final_fraction = (volatility_adjusted * drawdown_factor)
            .min(regime_cap)
            .min(self.config.max_position_pct);

        let position_size = (final_fraction * request.portfolio_value).round_dp(2);
        let stop_loss = self.stop_loss_pct(request.daily_volatility);
        let take_profit = stop_loss * self.config.reward_risk_ratio;

        let reasoning = format!(
            "kelly={} fractional={} regime={} x{} drawdown={}% x{} cap={} fraction={}",
            kelly_fraction.normalize(),
            fractional_kelly.normalize(),
            request.regime,
            regime_factor.normalize(),
            request.drawdown_pct.round_dp(2).normalize(),
            drawdown_factor.normalize(),
            regime_cap.min(self.config.max_position_pct).normalize(),
            final_fraction.normalize(),
        );

        Ok(Some(PositionDecision {
            id: Uuid::new_v4(),
            pair: request.pair.to_string(),
            signal: request.signal,
            confidence: request.confidence,
            max_probability: request.max_probability,
            kelly_fraction,
            fractional_kelly,
            volatility_adjusted_fraction: volatility_adjusted,
            position_size_zar: position_size,
            leverage: dec!(1.0),
            stop_loss_pct: stop_loss,
            take_profit_pct: take_profit,
            max_hold_time_hours: self.config.max_hold_time_hours,
            daily_volatility: request.daily_volatility,
            volatility_regime: request.regime,
            portfolio_value_zar: request.portfolio_value,
            current_drawdown_pct: request.drawdown_pct,
            executed: false,
            execution_id: None,
            approved: None,
            rejected_by: None,
            rejection_reason: None,
            downstream_decision: None,
            reasoning: Some(reasoning),
            created_at: chrono::Utc::now(),
        }))
    }

    /// Multiplier for the first tier whose ceiling covers `drawdown_pct`
    pub fn drawdown_multiplier(&self, drawdown_pct: Decimal) -> Decimal {
        self.config
            .drawdown_tiers
            .iter()
            .find(|tier| drawdown_pct <= tier.max_drawdown_pct)
            .map(|tier| tier.multiplier)
            .unwrap_or(self.config.drawdown_floor_multiplier)
    }

    /// `daily_vol * 100 * multiplier`, clamped to the configured band
    pub fn stop_loss_pct(&self, daily_volatility: Decimal) -> Decimal {
        (daily_volatility * dec!(100) * self.config.stop_loss_vol_multiplier)
            .max(self.config.min_stop_loss_pct)
            .min(self.config.max_stop_loss_pct)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(SizingConfig::default())
    }
}
