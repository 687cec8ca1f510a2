//! End-to-end tests for the risk engine over the in-memory store

use chrono::{DateTime, Duration, Utc};
use risk_engine::config::Config;
use risk_engine::engine::{EngineStores, ErrorKind, RiskEngine};
use risk_engine::risk::DecisionReview;
use risk_engine::signal::Signal;
use risk_engine::store::{MemoryStore, PricePoint};
use risk_engine::volatility::{
    EstimatorError, GarchEstimator, GarchParams, RefreshTrigger, VolatilityRegime,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Returns the same fit for every call
struct FixedEstimator(Result<GarchParams, EstimatorError>);

impl GarchEstimator for FixedEstimator {
    fn fit(&self, _returns: &[f64]) -> Result<GarchParams, EstimatorError> {
        self.0.clone()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Daily closes alternating 100 / 102, ending a minute ago
async fn seed_closes(store: &MemoryStore, pair: &str, count: i64) {
    let last_at: DateTime<Utc> = Utc::now() - Duration::minutes(1);
    let points = (0..count).map(|i| {
        let close = if i % 2 == 0 { dec!(100) } else { dec!(102) };
        PricePoint::new(last_at - Duration::days(count - 1 - i), close)
    });
    store.insert_prices(pair, points).await;
}

fn engine_with(store: &MemoryStore, estimator: FixedEstimator) -> RiskEngine {
    RiskEngine::from_config(
        &Config::default(),
        EngineStores::memory(store),
        Arc::new(estimator),
    )
}

fn engine(store: &MemoryStore) -> RiskEngine {
    engine_with(
        store,
        FixedEstimator(Ok(GarchParams::new(0.1, 0.1, 0.85))),
    )
}

#[tokio::test]
async fn test_buy_signal_produces_audited_decision() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);

    let decision = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.75), Some(dec!(0.8)))
        .await
        .unwrap()
        .expect("buy at 0.75 should size");

    // Alternating closes forecast just under 2% daily: low regime
    assert_eq!(decision.volatility_regime, VolatilityRegime::Low);
    assert_eq!(decision.kelly_fraction, dec!(0.625));
    assert_eq!(decision.fractional_kelly, dec!(0.15625));
    assert_eq!(decision.position_size_zar, dec!(15625.00));
    assert_eq!(decision.leverage, dec!(1.1));
    assert_eq!(decision.portfolio_value_zar, dec!(100000));
    assert_eq!(decision.max_probability, Some(dec!(0.8)));
    assert!(decision.stop_loss_pct >= dec!(2.0) && decision.stop_loss_pct <= dec!(10.0));
    assert_eq!(decision.take_profit_pct, decision.stop_loss_pct * dec!(2.0));
    assert!(decision.reasoning.as_deref().unwrap().contains("leverage=1.1"));

    let stored = engine.get_decision(decision.id).await.unwrap().unwrap();
    assert_eq!(stored, decision);

    let forecast = engine.latest_forecast("BTCZAR").await.unwrap().unwrap();
    assert_eq!(forecast.trigger, RefreshTrigger::Initial);
}

#[tokio::test]
async fn test_hold_is_not_audited() {
    let store = MemoryStore::new();
    seed_closes(&store, "ETHZAR", 91).await;
    let engine = engine(&store);

    let result = engine
        .decide("ETHZAR", Signal::Hold, dec!(0.9), None)
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(engine.recent_decisions(None, 10).await.unwrap().is_empty());

    // The forecast is still refreshed
    assert!(engine.latest_forecast("ETHZAR").await.unwrap().is_some());
}

#[tokio::test]
async fn test_low_confidence_is_no_trade() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);

    let result = engine
        .decide("BTCZAR", Signal::Sell, dec!(0.45), None)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_insufficient_history_persists_nothing() {
    let store = MemoryStore::new();
    seed_closes(&store, "SOLZAR", 30).await;
    let engine = engine(&store);

    let err = engine
        .decide("SOLZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);
    assert!(engine.latest_forecast("SOLZAR").await.unwrap().is_none());
    assert!(engine.recent_decisions(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_estimator_failure_is_reported() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine_with(
        &store,
        FixedEstimator(Err(EstimatorError::NoConvergence)),
    );

    let err = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Estimator);
    assert!(engine.recent_decisions(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_confidence_fails_before_io() {
    // No price history at all: validation must fail first
    let store = MemoryStore::new();
    let engine = engine(&store);

    let err = engine
        .decide("BTCZAR", Signal::Buy, dec!(1.5), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_drawdown_shrinks_size_and_leverage() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);

    engine.initialize_portfolio(dec!(100000)).await.unwrap();
    let state = engine.update_portfolio(dec!(85000)).await.unwrap();
    assert_eq!(state.current_drawdown_pct, dec!(15));

    let decision = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.75), None)
        .await
        .unwrap()
        .unwrap();

    // 0.15625 * 0.60 = 0.09375 of 85000
    assert_eq!(decision.position_size_zar, dec!(7968.75));
    assert_eq!(decision.current_drawdown_pct, dec!(15));
    // 1.0 + 0.1 - 0.5 clamps to 1.0
    assert_eq!(decision.leverage, dec!(1.0));
}

#[tokio::test]
async fn test_downstream_updates_target_latest_decision() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);

    let first = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap()
        .unwrap();
    let second = engine
        .decide("BTCZAR", Signal::Sell, dec!(0.7), None)
        .await
        .unwrap()
        .unwrap();

    let rejected = engine
        .mark_rejected(
            "BTCZAR",
            "llm_validator",
            "news risk",
            Some(serde_json::json!({ "verdict": "reject" })),
            None,
        )
        .await
        .unwrap();
    assert_eq!(rejected, second.id);

    let stored = engine.get_decision(second.id).await.unwrap().unwrap();
    assert_eq!(stored.approved, Some(false));
    assert_eq!(stored.rejected_by.as_deref(), Some("llm_validator"));
    assert_eq!(stored.rejection_reason.as_deref(), Some("news risk"));
    assert!(stored.downstream_decision.is_some());
    // Reasoning from sizing is kept when the review brings none
    assert_eq!(stored.reasoning, second.reasoning);

    // The earlier decision is untouched
    let untouched = engine.get_decision(first.id).await.unwrap().unwrap();
    assert_eq!(untouched.approved, None);
}

#[tokio::test]
async fn test_approve_then_execute() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);

    let decision = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap()
        .unwrap();

    engine
        .mark_approved("BTCZAR", None, Some("confirmed by validator".to_string()))
        .await
        .unwrap();
    let executed = engine.mark_executed("BTCZAR", "order-42").await.unwrap();
    assert_eq!(executed, decision.id);

    let stored = engine.get_decision(decision.id).await.unwrap().unwrap();
    assert_eq!(stored.approved, Some(true));
    assert!(stored.executed);
    assert_eq!(stored.execution_id.as_deref(), Some("order-42"));
    assert_eq!(stored.reasoning.as_deref(), Some("confirmed by validator"));
}

#[tokio::test]
async fn test_updates_without_decision_are_not_found() {
    let store = MemoryStore::new();
    let engine = engine(&store);

    let err = engine.mark_executed("BTCZAR", "order-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = engine
        .mark_rejected("BTCZAR", "llm_validator", "no", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = engine
        .review_decision(uuid::Uuid::new_v4(), &DecisionReview::approved())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_empty_execution_id_rejected() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);
    let decision = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap()
        .unwrap();

    let err = engine
        .confirm_execution(decision.id, "  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!engine.get_decision(decision.id).await.unwrap().unwrap().executed);
}

#[tokio::test]
async fn test_forecast_reused_across_decisions() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    let engine = engine(&store);

    engine
        .decide("BTCZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap();
    engine
        .decide("BTCZAR", Signal::Buy, dec!(0.9), None)
        .await
        .unwrap();

    let now = Utc::now();
    let history = engine
        .forecast_history("BTCZAR", now - Duration::hours(1), now)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_explicit_id_must_belong_to_pair() {
    let store = MemoryStore::new();
    seed_closes(&store, "BTCZAR", 91).await;
    seed_closes(&store, "ETHZAR", 91).await;
    let engine = engine(&store);

    let btc = engine
        .decide("BTCZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap()
        .unwrap();
    let eth = engine
        .decide("ETHZAR", Signal::Buy, dec!(0.8), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(engine.resolve_decision("BTCZAR", None).await.unwrap(), btc.id);
    assert_eq!(
        engine.resolve_decision("BTCZAR", Some(btc.id)).await.unwrap(),
        btc.id
    );

    let err = engine
        .resolve_decision("BTCZAR", Some(eth.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = engine
        .resolve_decision("BTCZAR", Some(uuid::Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The mismatched decision stays unreviewed
    assert_eq!(engine.get_decision(eth.id).await.unwrap().unwrap().approved, None);
}
