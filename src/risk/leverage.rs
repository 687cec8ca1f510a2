//! Dynamic leverage

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::RiskError;
use crate::config::LeverageConfig;
use crate::volatility::VolatilityRegime;

/// Components of a leverage calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageBreakdown {
    pub base: Decimal,
    pub confidence_bonus: Decimal,
    /// Zero or negative
    pub regime_penalty: Decimal,
    /// Zero or negative
    pub drawdown_penalty: Decimal,
    /// Sum of the components before clamping
    pub unclamped: Decimal,
    /// Final leverage in `[base, max]`
    pub leverage: Decimal,
}

impl fmt::Display for LeverageBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "leverage={} (base={} confidence={:+} regime={:+} drawdown={:+})",
            self.leverage.normalize(),
            self.base.normalize(),
            self.confidence_bonus.normalize(),
            self.regime_penalty.normalize(),
            self.drawdown_penalty.normalize(),
        )
    }
}

/// Confidence-, regime- and drawdown-driven leverage
#[derive(Debug, Clone)]
pub struct LeverageCalculator {
    config: LeverageConfig,
}

impl LeverageCalculator {
    pub fn new(config: LeverageConfig) -> Self {
        Self { config }
    }

    /// Leverage multiplier in `[base, max]`
    pub fn leverage(
        &self,
        confidence: Decimal,
        regime: VolatilityRegime,
        drawdown_pct: Decimal,
    ) -> Result<Decimal, RiskError> {
        Ok(self.breakdown(confidence, regime, drawdown_pct)?.leverage)
    }

    /// Every component of the leverage calculation
    pub fn breakdown(
        &self,
        confidence: Decimal,
        regime: VolatilityRegime,
        drawdown_pct: Decimal,
    ) -> Result<LeverageBreakdown, RiskError> {
        RiskError::check_probability("confidence", confidence)?;

        let c = &self.config;
        // Linear from zero at the threshold to (1 - threshold) * multiplier at 1.0
        let confidence_bonus = if confidence > c.confidence_threshold {
            (confidence - c.confidence_threshold) * c.confidence_multiplier
        } else {
            Decimal::ZERO
        };
        let regime_penalty = c.regime_penalties.get(regime);
        let drawdown_penalty = if drawdown_pct > c.drawdown_threshold_pct {
            c.drawdown_penalty
        } else {
            Decimal::ZERO
        };

        let unclamped = c.base + confidence_bonus + regime_penalty + drawdown_penalty;

        Ok(LeverageBreakdown {
            base: c.base,
            confidence_bonus,
            regime_penalty,
            drawdown_penalty,
            unclamped,
            leverage: unclamped.max(c.base).min(c.max),
        })
    }
}

impl Default for LeverageCalculator {
    fn default() -> Self {
        Self::new(LeverageConfig::default())
    }
}
