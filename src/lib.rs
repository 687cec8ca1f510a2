//! risk-engine: Risk decision layer for crypto trading signals
//!
//! This library provides the core components for:
//! - GARCH(1,1) volatility forecasting with regime classification
//! - Fractional Kelly position sizing with regime and drawdown scaling
//! - Dynamic leverage from confidence, regime and drawdown
//! - Portfolio value, peak and drawdown tracking
//! - An orchestrating engine that audits every decision
//! - SQLite, in-memory and Parquet storage
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod engine;
pub mod portfolio;
pub mod risk;
pub mod signal;
pub mod store;
pub mod telemetry;
pub mod volatility;
