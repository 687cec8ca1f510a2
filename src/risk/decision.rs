//! Position decision records

use crate::signal::Signal;
use crate::volatility::VolatilityRegime;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decision identifier
pub type DecisionId = Uuid;

/// An audited sizing decision
///
/// Created once per engine invocation that reaches sizing. Afterwards it is
/// mutated by a single review update and a single execution confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDecision {
    pub id: DecisionId,
    pub pair: String,
    pub signal: Signal,

    // Inputs echoed
    pub confidence: Decimal,
    pub max_probability: Option<Decimal>,

    // Kelly chain
    pub kelly_fraction: Decimal,
    pub fractional_kelly: Decimal,
    pub volatility_adjusted_fraction: Decimal,

    // Outputs
    pub position_size_zar: Decimal,
    pub leverage: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub max_hold_time_hours: u32,

    // Context snapshot
    pub daily_volatility: Decimal,
    pub volatility_regime: VolatilityRegime,
    pub portfolio_value_zar: Decimal,
    pub current_drawdown_pct: Decimal,

    // Audit
    pub executed: bool,
    pub execution_id: Option<String>,
    pub approved: Option<bool>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub downstream_decision: Option<serde_json::Value>,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PositionDecision {
    /// Fraction of the portfolio committed by this decision
    pub fn final_fraction(&self) -> Decimal {
        if self.portfolio_value_zar.is_zero() {
            return Decimal::ZERO;
        }
        self.position_size_zar / self.portfolio_value_zar
    }

    /// Whether a downstream reviewer rejected the decision
    pub fn is_rejected(&self) -> bool {
        self.approved == Some(false)
    }

    /// Apply a review in place
    pub fn apply_review(&mut self, review: &DecisionReview) {
        self.approved = Some(review.approved);
        self.rejected_by = review.rejected_by.clone();
        self.rejection_reason = review.rejection_reason.clone();
        self.downstream_decision = review.payload.clone();
        if review.reasoning.is_some() {
            self.reasoning = review.reasoning.clone();
        }
    }

    /// Apply an execution confirmation in place
    pub fn apply_execution(&mut self, execution_id: &str) {
        self.executed = true;
        self.execution_id = Some(execution_id.to_string());
    }
}

/// Downstream approval or rejection of a decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionReview {
    pub approved: bool,
    /// Tag naming the rejecting stage
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    /// Raw payload returned by the reviewer
    pub payload: Option<serde_json::Value>,
    pub reasoning: Option<String>,
}

impl DecisionReview {
    /// A positive review
    pub fn approved() -> Self {
        Self {
            approved: true,
            ..Default::default()
        }
    }

    /// A rejection attributed to `rejected_by`
    pub fn rejected(rejected_by: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            rejected_by: Some(rejected_by.into()),
            rejection_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}
