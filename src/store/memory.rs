//! In-memory store

use super::{
    DecisionStore, ForecastStore, PortfolioStore, PriceHistory, PricePoint, StoreError,
};
use crate::portfolio::PortfolioState;
use crate::risk::{DecisionId, DecisionReview, PositionDecision};
use crate::volatility::VolatilityForecast;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store keeping every table in process memory
///
/// Suitable for tests and ephemeral runs; state is lost on drop.
#[derive(Default, Clone)]
pub struct MemoryStore {
    prices: Arc<RwLock<HashMap<String, Vec<PricePoint>>>>,
    forecasts: Arc<RwLock<Vec<VolatilityForecast>>>,
    decisions: Arc<RwLock<Vec<PositionDecision>>>,
    portfolio: Arc<RwLock<Option<PortfolioState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add closes for a pair, keeping the series ordered by timestamp
    pub async fn insert_prices(&self, pair: &str, points: impl IntoIterator<Item = PricePoint>) {
        let mut prices = self.prices.write().await;
        let series = prices.entry(pair.to_string()).or_default();
        series.extend(points);
        series.sort_by_key(|p| p.timestamp);
    }
}

#[async_trait]
impl PriceHistory for MemoryStore {
    async fn closes_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, StoreError> {
        let prices = self.prices.read().await;
        Ok(prices
            .get(pair)
            .map(|series| {
                series
                    .iter()
                    .filter(|p| p.timestamp >= from && p.timestamp <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn close_at_or_before(
        &self,
        pair: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PricePoint>, StoreError> {
        let prices = self.prices.read().await;
        Ok(prices
            .get(pair)
            .and_then(|series| series.iter().rev().find(|p| p.timestamp <= at).copied()))
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn insert_forecast(&self, forecast: &VolatilityForecast) -> Result<(), StoreError> {
        self.forecasts.write().await.push(forecast.clone());
        Ok(())
    }

    async fn latest_forecast(
        &self,
        pair: &str,
    ) -> Result<Option<VolatilityForecast>, StoreError> {
        let forecasts = self.forecasts.read().await;
        Ok(forecasts
            .iter()
            .filter(|f| f.pair == pair)
            .max_by_key(|f| f.forecast_timestamp)
            .cloned())
    }

    async fn forecasts_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolatilityForecast>, StoreError> {
        let forecasts = self.forecasts.read().await;
        let mut rows: Vec<VolatilityForecast> = forecasts
            .iter()
            .filter(|f| {
                f.pair == pair && f.forecast_timestamp >= from && f.forecast_timestamp <= to
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.forecast_timestamp.cmp(&a.forecast_timestamp));
        Ok(rows)
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn insert_decision(&self, decision: &PositionDecision) -> Result<(), StoreError> {
        self.decisions.write().await.push(decision.clone());
        Ok(())
    }

    async fn get_decision(&self, id: DecisionId) -> Result<Option<PositionDecision>, StoreError> {
        let decisions = self.decisions.read().await;
        Ok(decisions.iter().find(|d| d.id == id).cloned())
    }

    async fn latest_decision_id(&self, pair: &str) -> Result<Option<DecisionId>, StoreError> {
        let decisions = self.decisions.read().await;
        // Insertion order breaks created_at ties
        Ok(decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.pair == pair)
            .max_by_key(|(i, d)| (d.created_at, *i))
            .map(|(_, d)| d.id))
    }

    async fn recent_decisions(
        &self,
        pair: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PositionDecision>, StoreError> {
        let decisions = self.decisions.read().await;
        let mut rows: Vec<(usize, &PositionDecision)> = decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| pair.map_or(true, |p| d.pair == p))
            .collect();
        rows.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(rows.into_iter().take(limit).map(|(_, d)| d.clone()).collect())
    }

    async fn record_review(
        &self,
        id: DecisionId,
        review: &DecisionReview,
    ) -> Result<bool, StoreError> {
        let mut decisions = self.decisions.write().await;
        match decisions.iter_mut().find(|d| d.id == id) {
            Some(decision) => {
                decision.apply_review(review);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_execution(
        &self,
        id: DecisionId,
        execution_id: &str,
    ) -> Result<bool, StoreError> {
        let mut decisions = self.decisions.write().await;
        match decisions.iter_mut().find(|d| d.id == id) {
            Some(decision) => {
                decision.apply_execution(execution_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn load_portfolio(&self) -> Result<Option<PortfolioState>, StoreError> {
        Ok(self.portfolio.read().await.clone())
    }

    async fn initialize_portfolio(
        &self,
        state: &PortfolioState,
    ) -> Result<PortfolioState, StoreError> {
        let mut slot = self.portfolio.write().await;
        let effective = slot.get_or_insert_with(|| PortfolioState {
            version: 1,
            ..state.clone()
        });
        Ok(effective.clone())
    }

    async fn apply_valuation(
        &self,
        total_value: Decimal,
        baseline: &PortfolioState,
        at: DateTime<Utc>,
    ) -> Result<PortfolioState, StoreError> {
        // Write lock spans the whole read-modify-write
        let mut slot = self.portfolio.write().await;
        let next = slot.as_ref().unwrap_or(baseline).revalue(total_value, at);
        *slot = Some(next.clone());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::decision::fixtures::decision;
    use crate::volatility::{GarchParams, RefreshTrigger, VolatilityRegime};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn forecast(pair: &str, at: DateTime<Utc>) -> VolatilityForecast {
        VolatilityForecast::new(
            pair,
            0.03,
            VolatilityRegime::Medium,
            GarchParams::new(0.1, 0.1, 0.8),
            89,
            RefreshTrigger::Scheduled,
            at,
        )
    }

    #[tokio::test]
    async fn test_price_queries() {
        let store = MemoryStore::new();
        let t0 = Utc::now() - Duration::hours(3);
        store
            .insert_prices(
                "BTCZAR",
                vec![
                    PricePoint::new(t0 + Duration::hours(2), dec!(102)),
                    PricePoint::new(t0, dec!(100)),
                    PricePoint::new(t0 + Duration::hours(1), dec!(101)),
                ],
            )
            .await;

        let all = store
            .closes_between("BTCZAR", t0, t0 + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|p| p.close).collect::<Vec<_>>(),
            vec![dec!(100), dec!(101), dec!(102)]
        );

        let before = store
            .close_at_or_before("BTCZAR", t0 + Duration::minutes(90))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.close, dec!(101));

        assert!(store
            .close_at_or_before("BTCZAR", t0 - Duration::minutes(1))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .closes_between("ETHZAR", t0, Utc::now())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_forecast_history_is_append_only() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_forecast(&forecast("BTCZAR", now - Duration::hours(8)))
            .await
            .unwrap();
        store
            .insert_forecast(&forecast("BTCZAR", now - Duration::hours(4)))
            .await
            .unwrap();
        store
            .insert_forecast(&forecast("ETHZAR", now))
            .await
            .unwrap();

        let latest = store.latest_forecast("BTCZAR").await.unwrap().unwrap();
        assert_eq!(latest.forecast_timestamp, now - Duration::hours(4));

        let history = store
            .forecasts_between("BTCZAR", now - Duration::days(1), now)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].forecast_timestamp > history[1].forecast_timestamp);
    }

    #[tokio::test]
    async fn test_latest_decision_and_updates() {
        let store = MemoryStore::new();
        let first = decision("BTCZAR");
        let second = decision("BTCZAR");
        let other = decision("ETHZAR");
        for d in [&first, &second, &other] {
            store.insert_decision(d).await.unwrap();
        }

        let latest = store.latest_decision_id("BTCZAR").await.unwrap();
        assert_eq!(latest, Some(second.id));

        let review = DecisionReview::rejected("validator", "spread too wide");
        assert!(store.record_review(second.id, &review).await.unwrap());
        assert!(store.record_execution(first.id, "exec-1").await.unwrap());

        let second_row = store.get_decision(second.id).await.unwrap().unwrap();
        assert_eq!(second_row.rejected_by.as_deref(), Some("validator"));
        let first_row = store.get_decision(first.id).await.unwrap().unwrap();
        assert!(first_row.executed);
        assert!(first_row.rejected_by.is_none());

        assert!(!store
            .record_execution(DecisionId::new_v4(), "missing")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_recent_decisions_filter_and_limit() {
        let store = MemoryStore::new();
        for pair in ["BTCZAR", "ETHZAR", "BTCZAR", "BTCZAR"] {
            store.insert_decision(&decision(pair)).await.unwrap();
        }

        let btc = store.recent_decisions(Some("BTCZAR"), 10).await.unwrap();
        assert_eq!(btc.len(), 3);
        assert!(btc.iter().all(|d| d.pair == "BTCZAR"));

        let limited = store.recent_decisions(None, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_portfolio_initialize_once() {
        let store = MemoryStore::new();
        assert!(store.load_portfolio().await.unwrap().is_none());

        let first = store
            .initialize_portfolio(&PortfolioState::initial(dec!(100000)))
            .await
            .unwrap();
        assert_eq!(first.total_value_zar, dec!(100000));
        assert_eq!(first.version, 1);

        let second = store
            .initialize_portfolio(&PortfolioState::initial(dec!(5)))
            .await
            .unwrap();
        assert_eq!(second.total_value_zar, dec!(100000));
    }

    #[tokio::test]
    async fn test_concurrent_valuations_do_not_lose_updates() {
        let store = MemoryStore::new();
        let baseline = PortfolioState::initial(dec!(1000));

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            let baseline = baseline.clone();
            handles.push(tokio::spawn(async move {
                store
                    .apply_valuation(Decimal::from(900 + i * 10), &baseline, Utc::now())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = store.load_portfolio().await.unwrap().unwrap();
        assert_eq!(state.version, 50);
        // Highest valuation was 900 + 49 * 10
        assert_eq!(state.peak_value_zar, dec!(1390));
        // 900 against the 1000 baseline peak is at least a 10% decline
        assert!(state.max_drawdown_pct >= dec!(10));
        assert!(state.is_consistent());
    }
}
