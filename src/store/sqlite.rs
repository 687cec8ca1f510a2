//! SQLite store
//!
//! Decimals are stored as TEXT to keep exact precision; timestamps as UTC
//! microseconds. Every call runs on the blocking pool.

use super::{
    DecisionStore, ForecastStore, PortfolioStore, PriceHistory, PricePoint, StoreError,
};
use crate::portfolio::PortfolioState;
use crate::risk::{DecisionId, DecisionReview, PositionDecision};
use crate::volatility::{RefreshTrigger, VolatilityForecast, VolatilityRegime};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS price_history (
    pair        TEXT    NOT NULL,
    ts          INTEGER NOT NULL,
    close       TEXT    NOT NULL,
    PRIMARY KEY (pair, ts)
);

CREATE TABLE IF NOT EXISTS volatility_forecasts (
    id                    TEXT    PRIMARY KEY,
    pair                  TEXT    NOT NULL,
    daily_volatility      REAL    NOT NULL CHECK (daily_volatility > 0),
    annualized_volatility REAL    NOT NULL,
    regime                TEXT    NOT NULL,
    omega                 REAL    NOT NULL,
    alpha                 REAL    NOT NULL,
    beta                  REAL    NOT NULL CHECK (alpha + beta < 1),
    observations          INTEGER NOT NULL,
    trigger               TEXT    NOT NULL,
    forecast_timestamp    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_forecasts_pair_ts
    ON volatility_forecasts (pair, forecast_timestamp DESC);

CREATE TABLE IF NOT EXISTS risk_decisions (
    seq                   INTEGER PRIMARY KEY AUTOINCREMENT,
    id                    TEXT    NOT NULL UNIQUE,
    pair                  TEXT    NOT NULL,
    signal                TEXT    NOT NULL,
    confidence            TEXT    NOT NULL,
    max_probability       TEXT,
    kelly_fraction        TEXT    NOT NULL,
    fractional_kelly      TEXT    NOT NULL,
    vol_adjusted_fraction TEXT    NOT NULL,
    position_size         TEXT    NOT NULL,
    leverage              TEXT    NOT NULL,
    stop_loss_pct         TEXT    NOT NULL,
    take_profit_pct       TEXT    NOT NULL,
    max_hold_time_hours   INTEGER NOT NULL,
    daily_volatility      TEXT    NOT NULL,
    regime                TEXT    NOT NULL,
    portfolio_value       TEXT    NOT NULL,
    drawdown_pct          TEXT    NOT NULL,
    executed              INTEGER NOT NULL DEFAULT 0,
    execution_id          TEXT,
    approved              INTEGER,
    rejected_by           TEXT,
    rejection_reason      TEXT,
    downstream_decision   TEXT,
    reasoning             TEXT,
    created_at            INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_decisions_pair_created
    ON risk_decisions (pair, created_at DESC);

CREATE TABLE IF NOT EXISTS portfolio_state (
    id                   INTEGER PRIMARY KEY CHECK (id = 1),
    total_value          TEXT    NOT NULL,
    peak_value           TEXT    NOT NULL,
    current_drawdown_pct TEXT    NOT NULL,
    max_drawdown_pct     TEXT    NOT NULL,
    last_updated         INTEGER NOT NULL,
    version              INTEGER NOT NULL
);
"#;

const DECISION_COLUMNS: &str = "id, pair, signal, confidence, max_probability, kelly_fraction, \
     fractional_kelly, vol_adjusted_fraction, position_size, leverage, stop_loss_pct, \
     take_profit_pct, max_hold_time_hours, daily_volatility, regime, portfolio_value, \
     drawdown_pct, executed, execution_id, approved, rejected_by, rejection_reason, \
     downstream_decision, reasoning, created_at";

const FORECAST_COLUMNS: &str = "id, pair, daily_volatility, annualized_volatility, regime, \
     omega, alpha, beta, observations, trigger, forecast_timestamp";

/// SQLite-backed implementation of every storage trait
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::TaskFailed("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }

    /// Upsert closes for a pair
    pub async fn insert_prices(&self, pair: &str, points: Vec<PricePoint>) -> Result<usize, StoreError> {
        let pair = pair.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO price_history (pair, ts, close) VALUES (?1, ?2, ?3)",
                )?;
                for p in &points {
                    stmt.execute(params![pair, p.timestamp.timestamp_micros(), p.close.to_string()])?;
                }
            }
            tx.commit()?;
            Ok(points.len())
        })
        .await
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(StoreError::Corrupt(msg)),
    )
}

fn timestamp_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| conversion_error(idx, format!("timestamp out of range: {micros}")))
}

fn decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_error(idx, format!("{text}: {e}")))
}

fn opt_decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| Decimal::from_str(&t).map_err(|e| conversion_error(idx, format!("{t}: {e}"))))
        .transpose()
}

fn parsed_col<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| conversion_error(idx, format!("{text}: {e}")))
}

fn map_forecast(row: &Row) -> rusqlite::Result<VolatilityForecast> {
    let trigger_text: String = row.get(9)?;
    let trigger = RefreshTrigger::parse(&trigger_text)
        .ok_or_else(|| conversion_error(9, format!("unknown trigger: {trigger_text}")))?;
    let observations: i64 = row.get(8)?;

    Ok(VolatilityForecast {
        id: uuid_col(row, 0)?,
        pair: row.get(1)?,
        daily_volatility: row.get(2)?,
        annualized_volatility: row.get(3)?,
        regime: parsed_col::<VolatilityRegime>(row, 4)?,
        garch_omega: row.get(5)?,
        garch_alpha: row.get(6)?,
        garch_beta: row.get(7)?,
        observations: observations.max(0) as usize,
        trigger,
        forecast_timestamp: timestamp_col(row, 10)?,
    })
}

fn map_decision(row: &Row) -> rusqlite::Result<PositionDecision> {
    let hold_hours: i64 = row.get(12)?;
    let executed: i64 = row.get(17)?;
    let approved: Option<i64> = row.get(19)?;
    let downstream: Option<String> = row.get(22)?;
    let downstream_decision = downstream
        .map(|text| serde_json::from_str(&text).map_err(|e| conversion_error(22, e.to_string())))
        .transpose()?;

    Ok(PositionDecision {
        id: uuid_col(row, 0)?,
        pair: row.get(1)?,
        signal: parsed_col(row, 2)?,
        confidence: decimal_col(row, 3)?,
        max_probability: opt_decimal_col(row, 4)?,
        kelly_fraction: decimal_col(row, 5)?,
        fractional_kelly: decimal_col(row, 6)?,
        volatility_adjusted_fraction: decimal_col(row, 7)?,
        position_size_zar: decimal_col(row, 8)?,
        leverage: decimal_col(row, 9)?,
        stop_loss_pct: decimal_col(row, 10)?,
        take_profit_pct: decimal_col(row, 11)?,
        max_hold_time_hours: hold_hours.max(0) as u32,
        daily_volatility: decimal_col(row, 13)?,
        volatility_regime: parsed_col(row, 14)?,
        portfolio_value_zar: decimal_col(row, 15)?,
        current_drawdown_pct: decimal_col(row, 16)?,
        executed: executed != 0,
        execution_id: row.get(18)?,
        approved: approved.map(|v| v != 0),
        rejected_by: row.get(20)?,
        rejection_reason: row.get(21)?,
        downstream_decision,
        reasoning: row.get(23)?,
        created_at: timestamp_col(row, 24)?,
    })
}

fn map_portfolio(row: &Row) -> rusqlite::Result<PortfolioState> {
    let version: i64 = row.get(5)?;
    Ok(PortfolioState {
        total_value_zar: decimal_col(row, 0)?,
        peak_value_zar: decimal_col(row, 1)?,
        current_drawdown_pct: decimal_col(row, 2)?,
        max_drawdown_pct: decimal_col(row, 3)?,
        last_updated: timestamp_col(row, 4)?,
        version: version.max(0) as u64,
    })
}

fn read_portfolio(conn: &Connection) -> rusqlite::Result<Option<PortfolioState>> {
    conn.query_row(
        "SELECT total_value, peak_value, current_drawdown_pct, max_drawdown_pct, \
         last_updated, version FROM portfolio_state WHERE id = 1",
        [],
        map_portfolio,
    )
    .optional()
}

#[async_trait]
impl PriceHistory for SqliteStore {
    async fn closes_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, StoreError> {
        let pair = pair.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ts, close FROM price_history \
                 WHERE pair = ?1 AND ts >= ?2 AND ts <= ?3 ORDER BY ts ASC",
            )?;
            let rows = stmt.query_map(params![pair, to_micros(from), to_micros(to)], |row| {
                Ok(PricePoint::new(timestamp_col(row, 0)?, decimal_col(row, 1)?))
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn close_at_or_before(
        &self,
        pair: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PricePoint>, StoreError> {
        let pair = pair.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT ts, close FROM price_history \
                     WHERE pair = ?1 AND ts <= ?2 ORDER BY ts DESC LIMIT 1",
                    params![pair, to_micros(at)],
                    |row| Ok(PricePoint::new(timestamp_col(row, 0)?, decimal_col(row, 1)?)),
                )
                .optional()?)
        })
        .await
    }
}

#[async_trait]
impl ForecastStore for SqliteStore {
    async fn insert_forecast(&self, forecast: &VolatilityForecast) -> Result<(), StoreError> {
        let f = forecast.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO volatility_forecasts ({FORECAST_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    f.id.to_string(),
                    f.pair,
                    f.daily_volatility,
                    f.annualized_volatility,
                    f.regime.as_str(),
                    f.garch_omega,
                    f.garch_alpha,
                    f.garch_beta,
                    f.observations as i64,
                    f.trigger.as_str(),
                    to_micros(f.forecast_timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_forecast(
        &self,
        pair: &str,
    ) -> Result<Option<VolatilityForecast>, StoreError> {
        let pair = pair.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {FORECAST_COLUMNS} FROM volatility_forecasts \
                         WHERE pair = ?1 ORDER BY forecast_timestamp DESC, rowid DESC LIMIT 1"
                    ),
                    params![pair],
                    map_forecast,
                )
                .optional()?)
        })
        .await
    }

    async fn forecasts_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolatilityForecast>, StoreError> {
        let pair = pair.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FORECAST_COLUMNS} FROM volatility_forecasts \
                 WHERE pair = ?1 AND forecast_timestamp >= ?2 AND forecast_timestamp <= ?3 \
                 ORDER BY forecast_timestamp DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(
                params![pair, to_micros(from), to_micros(to)],
                map_forecast,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

#[async_trait]
impl DecisionStore for SqliteStore {
    async fn insert_decision(&self, decision: &PositionDecision) -> Result<(), StoreError> {
        let d = decision.clone();
        self.with_conn(move |conn| {
            let downstream = d
                .downstream_decision
                .as_ref()
                .map(serde_json::Value::to_string);
            conn.execute(
                &format!(
                    "INSERT INTO risk_decisions ({DECISION_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)"
                ),
                params![
                    d.id.to_string(),
                    d.pair,
                    d.signal.as_str(),
                    d.confidence.to_string(),
                    d.max_probability.map(|p| p.to_string()),
                    d.kelly_fraction.to_string(),
                    d.fractional_kelly.to_string(),
                    d.volatility_adjusted_fraction.to_string(),
                    d.position_size_zar.to_string(),
                    d.leverage.to_string(),
                    d.stop_loss_pct.to_string(),
                    d.take_profit_pct.to_string(),
                    d.max_hold_time_hours as i64,
                    d.daily_volatility.to_string(),
                    d.volatility_regime.as_str(),
                    d.portfolio_value_zar.to_string(),
                    d.current_drawdown_pct.to_string(),
                    d.executed as i64,
                    d.execution_id,
                    d.approved.map(|a| a as i64),
                    d.rejected_by,
                    d.rejection_reason,
                    downstream,
                    d.reasoning,
                    to_micros(d.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_decision(&self, id: DecisionId) -> Result<Option<PositionDecision>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {DECISION_COLUMNS} FROM risk_decisions WHERE id = ?1"),
                    params![id.to_string()],
                    map_decision,
                )
                .optional()?)
        })
        .await
    }

    async fn latest_decision_id(&self, pair: &str) -> Result<Option<DecisionId>, StoreError> {
        let pair = pair.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM risk_decisions WHERE pair = ?1 \
                     ORDER BY created_at DESC, seq DESC LIMIT 1",
                    params![pair],
                    |row| uuid_col(row, 0),
                )
                .optional()?)
        })
        .await
    }

    async fn recent_decisions(
        &self,
        pair: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PositionDecision>, StoreError> {
        let pair = pair.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DECISION_COLUMNS} FROM risk_decisions \
                 WHERE (?1 IS NULL OR pair = ?1) \
                 ORDER BY created_at DESC, seq DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![pair, limit as i64], map_decision)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn record_review(
        &self,
        id: DecisionId,
        review: &DecisionReview,
    ) -> Result<bool, StoreError> {
        let review = review.clone();
        self.with_conn(move |conn| {
            let payload = review.payload.as_ref().map(serde_json::Value::to_string);
            let changed = conn.execute(
                "UPDATE risk_decisions SET approved = ?2, rejected_by = ?3, \
                 rejection_reason = ?4, downstream_decision = ?5, \
                 reasoning = COALESCE(?6, reasoning) WHERE id = ?1",
                params![
                    id.to_string(),
                    review.approved as i64,
                    review.rejected_by,
                    review.rejection_reason,
                    payload,
                    review.reasoning,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn record_execution(
        &self,
        id: DecisionId,
        execution_id: &str,
    ) -> Result<bool, StoreError> {
        let execution_id = execution_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE risk_decisions SET executed = 1, execution_id = ?2 WHERE id = ?1",
                params![id.to_string(), execution_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}

#[async_trait]
impl PortfolioStore for SqliteStore {
    async fn load_portfolio(&self) -> Result<Option<PortfolioState>, StoreError> {
        self.with_conn(|conn| Ok(read_portfolio(conn)?)).await
    }

    async fn initialize_portfolio(
        &self,
        state: &PortfolioState,
    ) -> Result<PortfolioState, StoreError> {
        let state = state.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT OR IGNORE INTO portfolio_state (id, total_value, peak_value, \
                 current_drawdown_pct, max_drawdown_pct, last_updated, version) \
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, 1)",
                params![
                    state.total_value_zar.to_string(),
                    state.peak_value_zar.to_string(),
                    state.current_drawdown_pct.to_string(),
                    state.max_drawdown_pct.to_string(),
                    to_micros(state.last_updated),
                ],
            )?;
            let effective = read_portfolio(&tx)?.ok_or_else(|| {
                StoreError::Corrupt("portfolio row missing after insert".to_string())
            })?;
            tx.commit()?;
            Ok(effective)
        })
        .await
    }

    async fn apply_valuation(
        &self,
        total_value: Decimal,
        baseline: &PortfolioState,
        at: DateTime<Utc>,
    ) -> Result<PortfolioState, StoreError> {
        let baseline = baseline.clone();
        self.with_conn(move |conn| {
            // IMMEDIATE takes the write lock before the read, so no other
            // connection can slip a valuation in between
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = read_portfolio(&tx)?;
            let next = current.as_ref().unwrap_or(&baseline).revalue(total_value, at);

            let changed = match current {
                Some(prev) => tx.execute(
                    "UPDATE portfolio_state SET total_value = ?1, peak_value = ?2, \
                     current_drawdown_pct = ?3, max_drawdown_pct = ?4, last_updated = ?5, \
                     version = version + 1 WHERE id = 1 AND version = ?6",
                    params![
                        next.total_value_zar.to_string(),
                        next.peak_value_zar.to_string(),
                        next.current_drawdown_pct.to_string(),
                        next.max_drawdown_pct.to_string(),
                        to_micros(at),
                        prev.version as i64,
                    ],
                )?,
                None => tx.execute(
                    "INSERT INTO portfolio_state (id, total_value, peak_value, \
                     current_drawdown_pct, max_drawdown_pct, last_updated, version) \
                     VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        next.total_value_zar.to_string(),
                        next.peak_value_zar.to_string(),
                        next.current_drawdown_pct.to_string(),
                        next.max_drawdown_pct.to_string(),
                        to_micros(at),
                        next.version as i64,
                    ],
                )?,
            };
            if changed != 1 {
                return Err(StoreError::Conflict(
                    "portfolio_state changed during valuation".to_string(),
                ));
            }

            tx.commit()?;
            Ok(next)
        })
        .await
    }
}
