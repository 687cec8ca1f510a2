//! Persistence module
//!
//! Narrow storage traits the engine reads and writes through, with in-memory,
//! SQLite and Parquet-backed implementations

mod memory;
mod parquet;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use parquet::{price_tick_schema, write_price_ticks, ParquetPriceHistory, PriceTickRecord};
pub use sqlite::SqliteStore;
pub use types::{PricePoint, StoreError};

use crate::portfolio::PortfolioState;
use crate::risk::{DecisionId, DecisionReview, PositionDecision};
use crate::volatility::VolatilityForecast;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Source of historical closes
#[async_trait]
pub trait PriceHistory: Send + Sync {
    /// Closes for `pair` within `[from, to]`, oldest first
    async fn closes_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, StoreError>;

    /// Latest close at or before `at`
    async fn close_at_or_before(
        &self,
        pair: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PricePoint>, StoreError>;
}

/// Append-only volatility forecast history
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Append a forecast row
    async fn insert_forecast(&self, forecast: &VolatilityForecast) -> Result<(), StoreError>;

    /// Most recent forecast for `pair`
    async fn latest_forecast(&self, pair: &str)
        -> Result<Option<VolatilityForecast>, StoreError>;

    /// Forecasts for `pair` within `[from, to]`, newest first
    async fn forecasts_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolatilityForecast>, StoreError>;
}

/// Audit trail of sizing decisions
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Persist a freshly created decision
    async fn insert_decision(&self, decision: &PositionDecision) -> Result<(), StoreError>;

    /// Fetch a decision by identifier
    async fn get_decision(&self, id: DecisionId) -> Result<Option<PositionDecision>, StoreError>;

    /// Identifier of the most recently created decision for `pair`
    async fn latest_decision_id(&self, pair: &str) -> Result<Option<DecisionId>, StoreError>;

    /// Most recent decisions, newest first, optionally for one pair
    async fn recent_decisions(
        &self,
        pair: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PositionDecision>, StoreError>;

    /// Record a downstream review; false when the decision does not exist
    async fn record_review(
        &self,
        id: DecisionId,
        review: &DecisionReview,
    ) -> Result<bool, StoreError>;

    /// Record an execution confirmation; false when the decision does not exist
    async fn record_execution(
        &self,
        id: DecisionId,
        execution_id: &str,
    ) -> Result<bool, StoreError>;
}

/// Singleton portfolio state
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Stored state, `None` before the first write
    async fn load_portfolio(&self) -> Result<Option<PortfolioState>, StoreError>;

    /// Store `state` unless a row already exists; returns the effective row
    async fn initialize_portfolio(
        &self,
        state: &PortfolioState,
    ) -> Result<PortfolioState, StoreError>;

    /// Atomically revalue the portfolio at `total_value`
    ///
    /// When nothing is stored yet, `baseline` is revalued instead. The
    /// read-modify-write must not interleave with another writer.
    async fn apply_valuation(
        &self,
        total_value: Decimal,
        baseline: &PortfolioState,
        at: DateTime<Utc>,
    ) -> Result<PortfolioState, StoreError>;
}
