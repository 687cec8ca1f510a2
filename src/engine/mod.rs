//! Risk engine
//!
//! Sequences volatility refresh, portfolio snapshot, sizing and leverage for
//! each signal, and persists the resulting decision as the audit trail.

mod stage;
mod types;

pub use stage::DecisionStage;
pub use types::{EngineError, ErrorKind};

use crate::config::Config;
use crate::portfolio::{PortfolioState, PortfolioStateTracker};
use crate::risk::{
    DecisionId, DecisionReview, LeverageCalculator, PositionDecision, PositionSizer,
    SizingRequest,
};
use crate::signal::{Signal, SignalInput};
use crate::store::{
    DecisionStore, ForecastStore, MemoryStore, PortfolioStore, PriceHistory, SqliteStore,
};
use crate::telemetry::{
    increment_counter, record_latency, CounterMetric, LatencyMetric,
};
use crate::volatility::{
    EstimatorError, GarchEstimator, VolatilityForecast, VolatilityModel,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Storage handles the engine reads and writes through
#[derive(Clone)]
pub struct EngineStores {
    pub prices: Arc<dyn PriceHistory>,
    pub forecasts: Arc<dyn ForecastStore>,
    pub decisions: Arc<dyn DecisionStore>,
    pub portfolio: Arc<dyn PortfolioStore>,
}

impl EngineStores {
    /// Every table in one in-memory store
    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            prices: Arc::new(store.clone()),
            forecasts: Arc::new(store.clone()),
            decisions: Arc::new(store.clone()),
            portfolio: Arc::new(store.clone()),
        }
    }

    /// Every table in one SQLite database
    pub fn sqlite(store: &SqliteStore) -> Self {
        Self {
            prices: Arc::new(store.clone()),
            forecasts: Arc::new(store.clone()),
            decisions: Arc::new(store.clone()),
            portfolio: Arc::new(store.clone()),
        }
    }

    /// Replace the price source
    pub fn with_prices(mut self, prices: Arc<dyn PriceHistory>) -> Self {
        self.prices = prices;
        self
    }
}

/// Orchestrates a risk decision per signal
pub struct RiskEngine {
    volatility: VolatilityModel,
    portfolio: PortfolioStateTracker,
    sizer: PositionSizer,
    leverage: LeverageCalculator,
    decisions: Arc<dyn DecisionStore>,
}

impl RiskEngine {
    pub fn new(
        volatility: VolatilityModel,
        portfolio: PortfolioStateTracker,
        sizer: PositionSizer,
        leverage: LeverageCalculator,
        decisions: Arc<dyn DecisionStore>,
    ) -> Self {
        Self {
            volatility,
            portfolio,
            sizer,
            leverage,
            decisions,
        }
    }

    /// Wire every component from configuration
    pub fn from_config(
        config: &Config,
        stores: EngineStores,
        estimator: Arc<dyn GarchEstimator>,
    ) -> Self {
        let volatility = VolatilityModel::new(
            stores.prices,
            stores.forecasts,
            estimator,
            config.volatility.clone(),
        );
        let portfolio =
            PortfolioStateTracker::new(stores.portfolio, config.portfolio.starting_capital_zar);

        Self::new(
            volatility,
            portfolio,
            PositionSizer::new(config.sizing.clone()),
            LeverageCalculator::new(config.leverage.clone()),
            stores.decisions,
        )
    }

    /// Produce an audited sizing decision, or `None` for no trade
    ///
    /// Nothing is persisted unless the whole chain succeeds.
    pub async fn decide(
        &self,
        pair: &str,
        signal: Signal,
        confidence: Decimal,
        max_probability: Option<Decimal>,
    ) -> Result<Option<PositionDecision>, EngineError> {
        let mut input = SignalInput::new(pair, signal, confidence);
        input.max_probability = max_probability;
        self.decide_signal(&input).await
    }

    /// [`decide`](Self::decide) from a signal record
    pub async fn decide_signal(
        &self,
        input: &SignalInput,
    ) -> Result<Option<PositionDecision>, EngineError> {
        let started = Instant::now();
        let result = self.run_decision(input).await;
        record_latency(LatencyMetric::Decision, started.elapsed());

        let outcome = match &result {
            Ok(Some(_)) => "sized",
            Ok(None) => "no_trade",
            Err(e) => {
                warn!(pair = %input.pair, kind = %e.kind(), error = %e, "Risk decision failed");
                "error"
            }
        };
        increment_counter(CounterMetric::Decisions(outcome));

        result
    }

    async fn run_decision(
        &self,
        input: &SignalInput,
    ) -> Result<Option<PositionDecision>, EngineError> {
        input.validate()?;
        let pair = input.pair.as_str();
        let mut stage = DecisionStage::Start;

        let forecast = self.volatility.refresh(pair).await?;
        stage = stage.advance(DecisionStage::VolatilityRefreshed, pair);

        let portfolio = self.portfolio.read().await?;
        stage = stage.advance(DecisionStage::PortfolioSnapshotted, pair);

        let daily_volatility = Decimal::from_f64(forecast.daily_volatility)
            .map(|v| v.round_dp(8))
            .ok_or_else(|| EstimatorError::InvalidParameters {
                omega: forecast.garch_omega,
                alpha: forecast.garch_alpha,
                beta: forecast.garch_beta,
            })?;

        let request = SizingRequest {
            pair,
            signal: input.signal,
            confidence: input.confidence,
            max_probability: input.max_probability,
            portfolio_value: portfolio.total_value_zar,
            daily_volatility,
            regime: forecast.regime,
            drawdown_pct: portfolio.current_drawdown_pct,
        };

        let Some(mut decision) = self.sizer.size(&request)? else {
            stage.advance(DecisionStage::NoTrade, pair);
            info!(
                pair,
                signal = %input.signal,
                confidence = %input.confidence,
                "No trade"
            );
            return Ok(None);
        };
        stage = stage.advance(DecisionStage::Sized, pair);

        let breakdown = self.leverage.breakdown(
            input.confidence,
            forecast.regime,
            portfolio.current_drawdown_pct,
        )?;
        decision.leverage = breakdown.leverage;
        decision.reasoning = Some(match decision.reasoning.take() {
            Some(sizing) => format!("{sizing}; {breakdown}"),
            None => breakdown.to_string(),
        });
        stage = stage.advance(DecisionStage::Leveraged, pair);

        self.decisions.insert_decision(&decision).await?;
        stage.advance(DecisionStage::Audited, pair);

        info!(
            pair,
            decision_id = %decision.id,
            signal = %decision.signal,
            size_zar = %decision.position_size_zar,
            leverage = %decision.leverage,
            stop_loss_pct = %decision.stop_loss_pct,
            regime = %decision.volatility_regime,
            "Risk decision audited"
        );

        Ok(Some(decision))
    }

    /// Record a downstream rejection against the latest decision for `pair`
    pub async fn mark_rejected(
        &self,
        pair: &str,
        rejected_by: &str,
        reason: &str,
        payload: Option<serde_json::Value>,
        reasoning: Option<String>,
    ) -> Result<DecisionId, EngineError> {
        let review = with_extras(DecisionReview::rejected(rejected_by, reason), payload, reasoning);
        let id = self.latest_decision_id(pair).await?;
        self.review_decision(id, &review).await?;
        Ok(id)
    }

    /// Record a downstream approval against the latest decision for `pair`
    pub async fn mark_approved(
        &self,
        pair: &str,
        payload: Option<serde_json::Value>,
        reasoning: Option<String>,
    ) -> Result<DecisionId, EngineError> {
        let review = with_extras(DecisionReview::approved(), payload, reasoning);
        let id = self.latest_decision_id(pair).await?;
        self.review_decision(id, &review).await?;
        Ok(id)
    }

    /// Confirm execution of the latest decision for `pair`
    ///
    /// Assumes at most one in-flight decision per pair; use
    /// [`confirm_execution`](Self::confirm_execution) when the id is known.
    pub async fn mark_executed(
        &self,
        pair: &str,
        execution_id: &str,
    ) -> Result<DecisionId, EngineError> {
        let id = self.latest_decision_id(pair).await?;
        self.confirm_execution(id, execution_id).await?;
        Ok(id)
    }

    /// Record a review against a specific decision
    pub async fn review_decision(
        &self,
        id: DecisionId,
        review: &DecisionReview,
    ) -> Result<(), EngineError> {
        if !self.decisions.record_review(id, review).await? {
            return Err(EngineError::DecisionNotFound(id.to_string()));
        }
        info!(
            decision_id = %id,
            approved = review.approved,
            rejected_by = review.rejected_by.as_deref().unwrap_or(""),
            "Decision reviewed"
        );
        Ok(())
    }

    /// Record an execution against a specific decision
    pub async fn confirm_execution(
        &self,
        id: DecisionId,
        execution_id: &str,
    ) -> Result<(), EngineError> {
        if execution_id.trim().is_empty() {
            return Err(crate::risk::RiskError::invalid(
                "execution_id",
                execution_id,
                "a non-empty identifier",
            )
            .into());
        }
        if !self.decisions.record_execution(id, execution_id).await? {
            return Err(EngineError::DecisionNotFound(id.to_string()));
        }
        info!(decision_id = %id, execution_id, "Decision executed");
        Ok(())
    }

    /// Decision to update for `pair`: `id` when given, else the latest
    ///
    /// An explicit `id` must belong to `pair`.
    pub async fn resolve_decision(
        &self,
        pair: &str,
        id: Option<DecisionId>,
    ) -> Result<DecisionId, EngineError> {
        let Some(id) = id else {
            return self.latest_decision_id(pair).await;
        };
        let decision = self
            .decisions
            .get_decision(id)
            .await?
            .ok_or_else(|| EngineError::DecisionNotFound(id.to_string()))?;
        if decision.pair != pair {
            return Err(crate::risk::RiskError::invalid(
                "decision_id",
                format!("{id} ({})", decision.pair),
                "a decision for the named pair",
            )
            .into());
        }
        Ok(id)
    }

    async fn latest_decision_id(&self, pair: &str) -> Result<DecisionId, EngineError> {
        self.decisions
            .latest_decision_id(pair)
            .await?
            .ok_or_else(|| EngineError::DecisionNotFound(pair.to_string()))
    }

    /// Refresh (or reuse) the forecast for `pair` without sizing
    pub async fn forecast(&self, pair: &str) -> Result<VolatilityForecast, EngineError> {
        Ok(self.volatility.refresh(pair).await?)
    }

    pub async fn latest_forecast(
        &self,
        pair: &str,
    ) -> Result<Option<VolatilityForecast>, EngineError> {
        Ok(self.volatility.latest(pair).await?)
    }

    /// Forecasts within `[from, to]`, newest first
    pub async fn forecast_history(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolatilityForecast>, EngineError> {
        Ok(self.volatility.history(pair, from, to).await?)
    }

    pub async fn get_decision(
        &self,
        id: DecisionId,
    ) -> Result<Option<PositionDecision>, EngineError> {
        Ok(self.decisions.get_decision(id).await?)
    }

    /// Latest decisions, newest first, optionally for a single pair
    pub async fn recent_decisions(
        &self,
        pair: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PositionDecision>, EngineError> {
        Ok(self.decisions.recent_decisions(pair, limit).await?)
    }

    pub async fn portfolio(&self) -> Result<PortfolioState, EngineError> {
        Ok(self.portfolio.read().await?)
    }

    pub async fn update_portfolio(
        &self,
        new_total_value: Decimal,
    ) -> Result<PortfolioState, EngineError> {
        Ok(self.portfolio.update(new_total_value).await?)
    }

    pub async fn initialize_portfolio(
        &self,
        starting_value: Decimal,
    ) -> Result<PortfolioState, EngineError> {
        Ok(self.portfolio.initialize(starting_value).await?)
    }
}

fn with_extras(
    mut review: DecisionReview,
    payload: Option<serde_json::Value>,
    reasoning: Option<String>,
) -> DecisionReview {
    if let Some(payload) = payload {
        review = review.with_payload(payload);
    }
    if let Some(reasoning) = reasoning {
        review = review.with_reasoning(reasoning);
    }
    review
}
