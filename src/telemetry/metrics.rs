//! Prometheus metrics
//!
//! Recording is a no-op until a recorder is installed, so library callers
//! and tests never need the exporter.

use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// End-to-end `decide` call
    Decision,
    /// GARCH estimator fit
    GarchFit,
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::Decision => "riskengine_decision_latency_ms",
            LatencyMetric::GarchFit => "riskengine_garch_fit_latency_ms",
        }
    }
}

/// Counter metric types, each carrying its label value
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Decision outcome: `sized`, `no_trade` or `error`
    Decisions(&'static str),
    /// Forecast refresh by trigger
    ForecastRefresh(&'static str),
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current portfolio value
    PortfolioValue,
    /// Current drawdown percentage
    DrawdownPct,
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::PortfolioValue => "riskengine_portfolio_value_zar",
            GaugeMetric::DrawdownPct => "riskengine_drawdown_pct",
        }
    }
}

/// Gauges labelled by pair
#[derive(Debug, Clone, Copy)]
pub enum PairGaugeMetric {
    /// Latest daily volatility forecast
    DailyVolatility,
}

impl PairGaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            PairGaugeMetric::DailyVolatility => "riskengine_daily_volatility",
        }
    }
}

/// Register descriptions with the installed recorder
pub fn describe_metrics() {
    describe_histogram!(
        LatencyMetric::Decision.name(),
        "Latency of a full risk decision in milliseconds"
    );
    describe_histogram!(
        LatencyMetric::GarchFit.name(),
        "Latency of a GARCH(1,1) fit in milliseconds"
    );
    describe_counter!("riskengine_decisions_total", "Risk decisions by outcome");
    describe_counter!(
        "riskengine_forecast_refresh_total",
        "Volatility forecast refreshes by trigger"
    );
    describe_gauge!(GaugeMetric::PortfolioValue.name(), "Portfolio value in ZAR");
    describe_gauge!(GaugeMetric::DrawdownPct.name(), "Current drawdown percentage");
    describe_gauge!(
        PairGaugeMetric::DailyVolatility.name(),
        "Latest daily volatility forecast per pair"
    );
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Increment a labelled counter
pub fn increment_counter(metric: CounterMetric) {
    match metric {
        CounterMetric::Decisions(outcome) => {
            counter!("riskengine_decisions_total", "outcome" => outcome).increment(1)
        }
        CounterMetric::ForecastRefresh(trigger) => {
            counter!("riskengine_forecast_refresh_total", "trigger" => trigger).increment(1)
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

/// Set a per-pair gauge value
pub fn set_pair_gauge(metric: PairGaugeMetric, pair: &str, value: f64) {
    gauge!(metric.name(), "pair" => pair.to_string()).set(value);
}
