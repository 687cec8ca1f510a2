//! Portfolio state tracker

use super::state::PortfolioState;
use crate::risk::RiskError;
use crate::store::{PortfolioStore, StoreError};
use crate::telemetry::{set_gauge, GaugeMetric};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Portfolio tracking errors
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Invalid(#[from] RiskError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads and revalues the singleton portfolio state
pub struct PortfolioStateTracker {
    store: Arc<dyn PortfolioStore>,
    starting_capital: Decimal,
}

impl PortfolioStateTracker {
    pub fn new(store: Arc<dyn PortfolioStore>, starting_capital: Decimal) -> Self {
        Self {
            store,
            starting_capital,
        }
    }

    /// Value reported before the portfolio is first written
    pub fn starting_capital(&self) -> Decimal {
        self.starting_capital
    }

    /// Current state, or the starting-capital default when nothing is stored
    ///
    /// The default is not persisted.
    pub async fn read(&self) -> Result<PortfolioState, PortfolioError> {
        Ok(self
            .store
            .load_portfolio()
            .await?
            .unwrap_or_else(|| PortfolioState::initial(self.starting_capital)))
    }

    /// Store the initial state unless one already exists
    pub async fn initialize(&self, starting_value: Decimal) -> Result<PortfolioState, PortfolioError> {
        RiskError::check_non_negative("starting_value", starting_value)?;
        let state = self
            .store
            .initialize_portfolio(&PortfolioState::initial(starting_value))
            .await?;
        info!(total_value = %state.total_value_zar, version = state.version, "Portfolio initialized");
        publish(&state);
        Ok(state)
    }

    /// Mark the portfolio at `new_total_value`
    ///
    /// Peak and max drawdown are recomputed and written in one atomic
    /// storage operation.
    pub async fn update(&self, new_total_value: Decimal) -> Result<PortfolioState, PortfolioError> {
        RiskError::check_non_negative("total_value", new_total_value)?;

        let baseline = PortfolioState::initial(self.starting_capital);
        let state = self
            .store
            .apply_valuation(new_total_value, &baseline, Utc::now())
            .await?;

        info!(
            total_value = %state.total_value_zar,
            peak_value = %state.peak_value_zar,
            drawdown_pct = %state.current_drawdown_pct.round_dp(4),
            version = state.version,
            "Portfolio revalued"
        );
        publish(&state);
        Ok(state)
    }
}

fn publish(state: &PortfolioState) {
    set_gauge(
        GaugeMetric::PortfolioValue,
        state.total_value_zar.to_f64().unwrap_or_default(),
    );
    set_gauge(
        GaugeMetric::DrawdownPct,
        state.current_drawdown_pct.to_f64().unwrap_or_default(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn tracker() -> PortfolioStateTracker {
        PortfolioStateTracker::new(Arc::new(MemoryStore::new()), dec!(100000))
    }

    #[tokio::test]
    async fn test_read_uninitialized_returns_default() {
        let store = MemoryStore::new();
        let tracker = PortfolioStateTracker::new(Arc::new(store.clone()), dec!(100000));

        let state = tracker.read().await.unwrap();
        assert_eq!(state.total_value_zar, dec!(100000));
        assert_eq!(state.current_drawdown_pct, dec!(0));
        assert!(store.load_portfolio().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worked_sequence() {
        let tracker = tracker();

        let down = tracker.update(dec!(90000)).await.unwrap();
        assert_eq!(down.current_drawdown_pct, dec!(10));
        assert_eq!(down.max_drawdown_pct, dec!(10));

        let up = tracker.update(dec!(120000)).await.unwrap();
        assert_eq!(up.peak_value_zar, dec!(120000));
        assert_eq!(up.current_drawdown_pct, dec!(0));
        assert_eq!(up.max_drawdown_pct, dec!(10));

        assert_eq!(tracker.read().await.unwrap(), up);
    }

    #[tokio::test]
    async fn test_initialize_then_update() {
        let tracker = tracker();
        let init = tracker.initialize(dec!(50000)).await.unwrap();
        assert_eq!(init.peak_value_zar, dec!(50000));

        // A second initialize keeps the existing row
        let again = tracker.initialize(dec!(75000)).await.unwrap();
        assert_eq!(again.total_value_zar, dec!(50000));

        let state = tracker.update(dec!(45000)).await.unwrap();
        assert_eq!(state.current_drawdown_pct, dec!(10));
    }

    #[tokio::test]
    async fn test_negative_value_rejected() {
        let tracker = tracker();
        let err = tracker.update(dec!(-1)).await.unwrap_err();
        assert!(matches!(err, PortfolioError::Invalid(_)));
        assert!(tracker.initialize(dec!(-5)).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_value_is_full_drawdown() {
        let tracker = tracker();
        let state = tracker.update(dec!(0)).await.unwrap();
        assert_eq!(state.current_drawdown_pct, dec!(100));
        assert!(state.is_consistent());
    }
}
