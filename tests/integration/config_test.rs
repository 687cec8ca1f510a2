//! Configuration loading tests

use risk_engine::config::{Config, LogFormat, StorageBackend};
use risk_engine::volatility::VolatilityRegime;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.volatility.lookback_days, 90);
    assert_eq!(config.sizing.fractional_kelly, dec!(0.25));
    assert_eq!(config.sizing.drawdown_tiers.len(), 3);
    assert_eq!(config.sizing.regime_caps.get(VolatilityRegime::Extreme), dec!(0.05));
    assert_eq!(config.leverage.max, dec!(3.0));
    assert_eq!(config.leverage.regime_penalties.get(VolatilityRegime::Medium), dec!(-0.3));
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(config.storage.price_data_dir.is_none());
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert_eq!(config.volatility.bands_for("ETHZAR").low, 0.025);
    assert_eq!(config.volatility.bands_for("BTCZAR").low, 0.02);
}

#[test]
fn test_example_matches_defaults() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let loaded = Config::load(path).unwrap();
    let defaults = Config::default();

    assert_eq!(loaded.sizing.regime_factors, defaults.sizing.regime_factors);
    assert_eq!(loaded.sizing.drawdown_tiers, defaults.sizing.drawdown_tiers);
    assert_eq!(
        loaded.leverage.confidence_threshold,
        defaults.leverage.confidence_threshold
    );
    assert_eq!(
        loaded.portfolio.starting_capital_zar,
        defaults.portfolio.starting_capital_zar
    );
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[leverage]\nbase = 4.0\nmax = 3.0").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::load("/nonexistent/risk_engine.toml").is_err());
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = Config::default();
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    parsed.validate().unwrap();
    assert_eq!(parsed.sizing.max_position_pct, config.sizing.max_position_pct);
}
