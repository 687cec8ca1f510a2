//! Engine tests over the durable backends

use chrono::{Duration, Utc};
use risk_engine::config::Config;
use risk_engine::engine::{EngineStores, RiskEngine};
use risk_engine::signal::Signal;
use risk_engine::store::{
    write_price_ticks, MemoryStore, PricePoint, PriceTickRecord, SqliteStore,
};
use risk_engine::volatility::{EstimatorError, GarchEstimator, GarchParams};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

struct FixedEstimator;

impl GarchEstimator for FixedEstimator {
    fn fit(&self, _returns: &[f64]) -> Result<GarchParams, EstimatorError> {
        Ok(GarchParams::new(0.1, 0.1, 0.85))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn closes(count: i64) -> Vec<PricePoint> {
    let last_at = Utc::now() - Duration::minutes(1);
    (0..count)
        .map(|i| {
            let close = if i % 2 == 0 { dec!(100) } else { dec!(102) };
            PricePoint::new(last_at - Duration::days(count - 1 - i), close)
        })
        .collect()
}

fn engine(stores: EngineStores) -> RiskEngine {
    RiskEngine::from_config(&Config::default(), stores, Arc::new(FixedEstimator))
}

#[tokio::test]
async fn test_sqlite_audit_trail_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("db").join("risk.db");

    let decision = {
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.insert_prices("BTCZAR", closes(91)).await.unwrap(), 91);

        let engine = engine(EngineStores::sqlite(&store));
        engine.initialize_portfolio(dec!(100000)).await.unwrap();
        engine.update_portfolio(dec!(95000)).await.unwrap();

        let decision = engine
            .decide("BTCZAR", Signal::Buy, dec!(0.75), Some(dec!(0.8)))
            .await
            .unwrap()
            .unwrap();
        engine
            .mark_rejected("BTCZAR", "llm_validator", "spread too wide", None, None)
            .await
            .unwrap();
        decision
    };

    let store = SqliteStore::open(&path).unwrap();
    let engine = engine(EngineStores::sqlite(&store));

    let stored = engine.get_decision(decision.id).await.unwrap().unwrap();
    assert_eq!(stored.position_size_zar, decision.position_size_zar);
    assert_eq!(stored.volatility_adjusted_fraction, decision.volatility_adjusted_fraction);
    assert_eq!(stored.leverage, decision.leverage);
    assert_eq!(stored.daily_volatility, decision.daily_volatility);
    assert_eq!(stored.max_probability, Some(dec!(0.8)));
    assert_eq!(stored.rejected_by.as_deref(), Some("llm_validator"));
    assert_eq!(stored.reasoning, decision.reasoning);

    let portfolio = engine.portfolio().await.unwrap();
    assert_eq!(portfolio.total_value_zar, dec!(95000));
    assert_eq!(portfolio.peak_value_zar, dec!(100000));
    assert_eq!(portfolio.current_drawdown_pct, dec!(5));

    let forecast = engine.latest_forecast("BTCZAR").await.unwrap().unwrap();
    assert_eq!(forecast.observations, 89);
}

#[tokio::test]
async fn test_parquet_prices_feed_the_model() {
    let temp_dir = TempDir::new().unwrap();
    let ticks: Vec<PriceTickRecord> = closes(91)
        .into_iter()
        .map(|p| PriceTickRecord::new(p.timestamp, "BTCZAR", p.close))
        .collect();
    write_price_ticks(
        &temp_dir.path().join("price_ticks_20250101_000000.parquet"),
        &ticks,
    )
    .unwrap();

    let memory = MemoryStore::new();
    let stores = EngineStores::memory(&memory).with_prices(Arc::new(
        risk_engine::store::ParquetPriceHistory::new(temp_dir.path()),
    ));
    let engine = engine(stores);

    let forecast = engine.forecast("BTCZAR").await.unwrap();
    assert_eq!(forecast.observations, 89);
    assert!(forecast.daily_volatility > 0.0);

    // Memory prices are ignored once Parquet is configured
    assert!(engine.forecast("ETHZAR").await.is_err());
}
