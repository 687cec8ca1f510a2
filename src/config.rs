//! Configuration types for risk-engine

use crate::volatility::{RegimeBands, RegimeTable, MIN_FIT_RETURNS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub volatility: VolatilityConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub leverage: LeverageConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// GARCH forecast and refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// History window fed to the estimator (days)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Minimum log returns required to fit
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,

    /// A forecast younger than this is reused (hours)
    #[serde(default = "default_update_interval_hours")]
    pub update_interval_hours: u32,

    /// Absolute price change that forces a refresh (0.05 = 5%)
    #[serde(default = "default_extreme_move_threshold")]
    pub extreme_move_threshold: Decimal,

    /// Lookback for the extreme-move comparison (minutes)
    #[serde(default = "default_extreme_move_window_minutes")]
    pub extreme_move_window_minutes: u32,

    /// Trailing returns used as the lagged conditional variance proxy
    #[serde(default = "default_realized_variance_window")]
    pub realized_variance_window: usize,

    /// Closes per day in the price store (1.0 for daily closes, 24.0 for hourly)
    #[serde(default = "default_periods_per_day")]
    pub periods_per_day: f64,

    /// Regime thresholds for pairs without an override
    #[serde(default)]
    pub default_bands: RegimeBands,

    /// Per-pair regime thresholds
    #[serde(default)]
    pub pair_bands: HashMap<String, RegimeBands>,
}

fn default_lookback_days() -> u32 {
    90
}
fn default_min_observations() -> usize {
    60
}
fn default_update_interval_hours() -> u32 {
    4
}
fn default_extreme_move_threshold() -> Decimal {
    dec!(0.05)
}
fn default_extreme_move_window_minutes() -> u32 {
    60
}
fn default_realized_variance_window() -> usize {
    20
}
fn default_periods_per_day() -> f64 {
    1.0
}

impl VolatilityConfig {
    /// Bands for a pair, falling back to the defaults
    pub fn bands_for(&self, pair: &str) -> RegimeBands {
        self.pair_bands
            .get(pair)
            .copied()
            .unwrap_or(self.default_bands)
    }
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            min_observations: default_min_observations(),
            update_interval_hours: default_update_interval_hours(),
            extreme_move_threshold: default_extreme_move_threshold(),
            extreme_move_window_minutes: default_extreme_move_window_minutes(),
            realized_variance_window: default_realized_variance_window(),
            periods_per_day: default_periods_per_day(),
            default_bands: RegimeBands::default(),
            pair_bands: HashMap::new(),
        }
    }
}

/// One drawdown tier: at or below `max_drawdown_pct`, scale by `multiplier`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownTier {
    pub max_drawdown_pct: Decimal,
    pub multiplier: Decimal,
}

impl DrawdownTier {
    pub fn new(max_drawdown_pct: Decimal, multiplier: Decimal) -> Self {
        Self {
            max_drawdown_pct,
            multiplier,
        }
    }
}

/// Position sizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Safety factor applied to raw Kelly
    #[serde(default = "default_fractional_kelly")]
    pub fractional_kelly: Decimal,

    /// Win/loss payoff ratio `b`, also the take-profit multiple of the stop
    #[serde(default = "default_reward_risk_ratio")]
    pub reward_risk_ratio: Decimal,

    /// Signals below this confidence are not traded
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Decimal,

    /// Global ceiling on the portfolio fraction
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: Decimal,

    /// Kelly multiplier per regime
    #[serde(default = "default_regime_factors")]
    pub regime_factors: RegimeTable<Decimal>,

    /// Fraction ceiling per regime
    #[serde(default = "default_regime_caps")]
    pub regime_caps: RegimeTable<Decimal>,

    /// Ascending drawdown tiers
    #[serde(default = "default_drawdown_tiers")]
    pub drawdown_tiers: Vec<DrawdownTier>,

    /// Multiplier once drawdown exceeds every tier
    #[serde(default = "default_drawdown_floor_multiplier")]
    pub drawdown_floor_multiplier: Decimal,

    /// Stop-loss as a multiple of daily volatility (in percent)
    #[serde(default = "default_stop_loss_vol_multiplier")]
    pub stop_loss_vol_multiplier: Decimal,

    #[serde(default = "default_min_stop_loss_pct")]
    pub min_stop_loss_pct: Decimal,

    #[serde(default = "default_max_stop_loss_pct")]
    pub max_stop_loss_pct: Decimal,

    #[serde(default = "default_max_hold_time_hours")]
    pub max_hold_time_hours: u32,
}

fn default_fractional_kelly() -> Decimal {
    dec!(0.25)
}
fn default_reward_risk_ratio() -> Decimal {
    dec!(2.0)
}
fn default_min_confidence() -> Decimal {
    dec!(0.50)
}
fn default_max_position_pct() -> Decimal {
    dec!(0.20)
}
fn default_regime_factors() -> RegimeTable<Decimal> {
    RegimeTable::new(dec!(1.00), dec!(0.85), dec!(0.70), dec!(0.50))
}
fn default_regime_caps() -> RegimeTable<Decimal> {
    RegimeTable::new(dec!(0.20), dec!(0.15), dec!(0.10), dec!(0.05))
}
fn default_drawdown_tiers() -> Vec<DrawdownTier> {
    vec![
        DrawdownTier::new(dec!(5), dec!(1.00)),
        DrawdownTier::new(dec!(10), dec!(0.80)),
        DrawdownTier::new(dec!(15), dec!(0.60)),
    ]
}
fn default_drawdown_floor_multiplier() -> Decimal {
    dec!(0.40)
}
fn default_stop_loss_vol_multiplier() -> Decimal {
    dec!(1.5)
}
fn default_min_stop_loss_pct() -> Decimal {
    dec!(2.0)
}
fn default_max_stop_loss_pct() -> Decimal {
    dec!(10.0)
}
fn default_max_hold_time_hours() -> u32 {
    24
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            fractional_kelly: default_fractional_kelly(),
            reward_risk_ratio: default_reward_risk_ratio(),
            min_confidence: default_min_confidence(),
            max_position_pct: default_max_position_pct(),
            regime_factors: default_regime_factors(),
            regime_caps: default_regime_caps(),
            drawdown_tiers: default_drawdown_tiers(),
            drawdown_floor_multiplier: default_drawdown_floor_multiplier(),
            stop_loss_vol_multiplier: default_stop_loss_vol_multiplier(),
            min_stop_loss_pct: default_min_stop_loss_pct(),
            max_stop_loss_pct: default_max_stop_loss_pct(),
            max_hold_time_hours: default_max_hold_time_hours(),
        }
    }
}

/// Dynamic leverage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageConfig {
    /// Floor and starting point
    #[serde(default = "default_base_leverage")]
    pub base: Decimal,

    #[serde(default = "default_max_leverage")]
    pub max: Decimal,

    /// Confidence above which the bonus starts
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: Decimal,

    /// Bonus per unit of confidence above the threshold
    #[serde(default = "default_confidence_multiplier")]
    pub confidence_multiplier: Decimal,

    /// Drawdown above which the penalty applies (percent)
    #[serde(default = "default_drawdown_threshold_pct")]
    pub drawdown_threshold_pct: Decimal,

    /// Added when drawdown exceeds the threshold (negative)
    #[serde(default = "default_drawdown_penalty")]
    pub drawdown_penalty: Decimal,

    /// Added per regime (zero or negative)
    #[serde(default = "default_regime_penalties")]
    pub regime_penalties: RegimeTable<Decimal>,
}

fn default_base_leverage() -> Decimal {
    dec!(1.0)
}
fn default_max_leverage() -> Decimal {
    dec!(3.0)
}
fn default_confidence_threshold() -> Decimal {
    dec!(0.70)
}
fn default_confidence_multiplier() -> Decimal {
    dec!(2.0)
}
fn default_drawdown_threshold_pct() -> Decimal {
    dec!(10)
}
fn default_drawdown_penalty() -> Decimal {
    dec!(-0.5)
}
fn default_regime_penalties() -> RegimeTable<Decimal> {
    RegimeTable::new(dec!(0), dec!(-0.3), dec!(-0.5), dec!(-1.0))
}

impl Default for LeverageConfig {
    fn default() -> Self {
        Self {
            base: default_base_leverage(),
            max: default_max_leverage(),
            confidence_threshold: default_confidence_threshold(),
            confidence_multiplier: default_confidence_multiplier(),
            drawdown_threshold_pct: default_drawdown_threshold_pct(),
            drawdown_penalty: default_drawdown_penalty(),
            regime_penalties: default_regime_penalties(),
        }
    }
}

/// Portfolio tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Value reported before the portfolio is ever written
    #[serde(default = "default_starting_capital")]
    pub starting_capital_zar: Decimal,
}

fn default_starting_capital() -> Decimal {
    dec!(100000)
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            starting_capital_zar: default_starting_capital(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit
    Memory,
    #[default]
    Sqlite,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// Directory of `price_ticks_*.parquet` files; prices come from SQLite when unset
    #[serde(default)]
    pub price_data_dir: Option<PathBuf>,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/risk_engine.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: default_sqlite_path(),
            price_data_dir: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus scrape port; no listener when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        let v = &self.volatility;
        anyhow::ensure!(v.lookback_days > 0, "volatility.lookback_days must be positive");
        anyhow::ensure!(
            v.min_observations >= MIN_FIT_RETURNS,
            "volatility.min_observations must be at least {MIN_FIT_RETURNS}"
        );
        anyhow::ensure!(
            v.realized_variance_window >= 1,
            "volatility.realized_variance_window must be positive"
        );
        anyhow::ensure!(
            v.periods_per_day > 0.0,
            "volatility.periods_per_day must be positive"
        );
        anyhow::ensure!(
            v.extreme_move_threshold > Decimal::ZERO,
            "volatility.extreme_move_threshold must be positive"
        );
        anyhow::ensure!(
            v.default_bands.is_ordered(),
            "volatility.default_bands must be positive and increasing"
        );
        for (pair, bands) in &v.pair_bands {
            anyhow::ensure!(
                bands.is_ordered(),
                "volatility.pair_bands.{pair} must be positive and increasing"
            );
        }

        let s = &self.sizing;
        anyhow::ensure!(
            s.fractional_kelly > Decimal::ZERO && s.fractional_kelly <= Decimal::ONE,
            "sizing.fractional_kelly must be in (0, 1]"
        );
        anyhow::ensure!(
            s.reward_risk_ratio > Decimal::ZERO,
            "sizing.reward_risk_ratio must be positive"
        );
        anyhow::ensure!(
            s.min_confidence >= Decimal::ZERO && s.min_confidence <= Decimal::ONE,
            "sizing.min_confidence must be in [0, 1]"
        );
        anyhow::ensure!(
            s.max_position_pct > Decimal::ZERO && s.max_position_pct <= Decimal::ONE,
            "sizing.max_position_pct must be in (0, 1]"
        );
        anyhow::ensure!(
            s.regime_caps
                .values()
                .iter()
                .all(|c| *c >= Decimal::ZERO && *c <= Decimal::ONE),
            "sizing.regime_caps must be in [0, 1]"
        );
        anyhow::ensure!(
            s.regime_factors.values().iter().all(|f| *f >= Decimal::ZERO),
            "sizing.regime_factors must be non-negative"
        );
        anyhow::ensure!(
            s.drawdown_tiers
                .windows(2)
                .all(|w| w[0].max_drawdown_pct < w[1].max_drawdown_pct),
            "sizing.drawdown_tiers must be strictly ascending"
        );
        anyhow::ensure!(
            s.min_stop_loss_pct > Decimal::ZERO && s.min_stop_loss_pct <= s.max_stop_loss_pct,
            "sizing stop-loss bounds must satisfy 0 < min <= max"
        );

        let l = &self.leverage;
        anyhow::ensure!(
            l.base >= Decimal::ONE && l.base <= l.max,
            "leverage bounds must satisfy 1 <= base <= max"
        );
        anyhow::ensure!(
            l.confidence_threshold >= Decimal::ZERO && l.confidence_threshold < Decimal::ONE,
            "leverage.confidence_threshold must be in [0, 1)"
        );

        anyhow::ensure!(
            self.portfolio.starting_capital_zar >= Decimal::ZERO,
            "portfolio.starting_capital_zar must be non-negative"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volatility::VolatilityRegime;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.volatility.lookback_days, 90);
        assert_eq!(config.volatility.min_observations, 60);
        assert_eq!(config.volatility.update_interval_hours, 4);
        assert_eq!(config.sizing.fractional_kelly, dec!(0.25));
        assert_eq!(config.sizing.reward_risk_ratio, dec!(2.0));
        assert_eq!(config.leverage.max, dec!(3.0));
        assert_eq!(config.portfolio.starting_capital_zar, dec!(100000));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [sizing]
            min_confidence = 0.55
            regime_caps = { low = 0.25, medium = 0.15, high = 0.10, extreme = 0.02 }

            [leverage]
            max = 2.0

            [storage]
            backend = "memory"

            [telemetry]
            log_format = "json"
            metrics_port = 9100
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sizing.min_confidence, dec!(0.55));
        assert_eq!(config.sizing.fractional_kelly, dec!(0.25));
        assert_eq!(
            config.sizing.regime_caps.get(VolatilityRegime::Extreme),
            dec!(0.02)
        );
        assert_eq!(config.leverage.max, dec!(2.0));
        assert_eq!(config.leverage.base, dec!(1.0));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.telemetry.metrics_port, Some(9100));
        config.validate().unwrap();
    }

    #[test]
    fn test_pair_bands_override() {
        let toml = r#"
            [volatility.pair_bands.XRPZAR]
            low = 0.03
            medium = 0.05
            high = 0.08
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.volatility.bands_for("XRPZAR").high, 0.08);
        assert_eq!(
            config.volatility.bands_for("BTCZAR"),
            RegimeBands::default()
        );
    }

    #[test]
    fn test_drawdown_tiers() {
        let toml = r#"
            [sizing]
            drawdown_floor_multiplier = 0.25

            [[sizing.drawdown_tiers]]
            max_drawdown_pct = 3
            multiplier = 1.0

            [[sizing.drawdown_tiers]]
            max_drawdown_pct = 8
            multiplier = 0.5
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sizing.drawdown_tiers.len(), 2);
        assert_eq!(config.sizing.drawdown_tiers[1].multiplier, dec!(0.5));
        assert_eq!(config.sizing.drawdown_floor_multiplier, dec!(0.25));
    }

    #[test]
    fn test_validate_rejects_unordered_bands() {
        let mut config = Config::default();
        config.volatility.default_bands = RegimeBands::new(0.05, 0.03, 0.08);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_descending_tiers() {
        let mut config = Config::default();
        config.sizing.drawdown_tiers = vec![
            DrawdownTier::new(dec!(10), dec!(0.8)),
            DrawdownTier::new(dec!(5), dec!(1.0)),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_min_observations_floor() {
        let mut config = Config::default();
        config.volatility.min_observations = 2;
        assert!(config.validate().is_err());
        config.volatility.min_observations = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_leverage_below_one() {
        let mut config = Config::default();
        config.leverage.base = dec!(0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
