//! Volatility regime classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discretized bucket of forecast daily volatility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
    Extreme,
}

impl VolatilityRegime {
    /// All regimes, calmest first
    pub const ALL: [VolatilityRegime; 4] = [
        VolatilityRegime::Low,
        VolatilityRegime::Medium,
        VolatilityRegime::High,
        VolatilityRegime::Extreme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityRegime::Low => "LOW",
            VolatilityRegime::Medium => "MEDIUM",
            VolatilityRegime::High => "HIGH",
            VolatilityRegime::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolatilityRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(VolatilityRegime::Low),
            "MEDIUM" => Ok(VolatilityRegime::Medium),
            "HIGH" => Ok(VolatilityRegime::High),
            "EXTREME" => Ok(VolatilityRegime::Extreme),
            other => Err(format!("unknown volatility regime: {other}")),
        }
    }
}

/// Upper bounds (exclusive) of daily volatility for the three calmer regimes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeBands {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl RegimeBands {
    pub fn new(low: f64, medium: f64, high: f64) -> Self {
        Self { low, medium, high }
    }

    /// Map a daily volatility onto its regime
    pub fn classify(&self, daily_volatility: f64) -> VolatilityRegime {
        if daily_volatility < self.low {
            VolatilityRegime::Low
        } else if daily_volatility < self.medium {
            VolatilityRegime::Medium
        } else if daily_volatility < self.high {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Extreme
        }
    }

    /// Bands must be positive and strictly increasing
    pub fn is_ordered(&self) -> bool {
        self.low > 0.0 && self.low < self.medium && self.medium < self.high
    }
}

impl Default for RegimeBands {
    fn default() -> Self {
        Self {
            low: 0.02,
            medium: 0.035,
            high: 0.05,
        }
    }
}

/// One value per volatility regime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeTable<T> {
    pub low: T,
    pub medium: T,
    pub high: T,
    pub extreme: T,
}

impl<T: Copy> RegimeTable<T> {
    pub fn new(low: T, medium: T, high: T, extreme: T) -> Self {
        Self {
            low,
            medium,
            high,
            extreme,
        }
    }

    /// Look up the value for a regime
    pub fn get(&self, regime: VolatilityRegime) -> T {
        match regime {
            VolatilityRegime::Low => self.low,
            VolatilityRegime::Medium => self.medium,
            VolatilityRegime::High => self.high,
            VolatilityRegime::Extreme => self.extreme,
        }
    }

    /// Values in regime order, calmest first
    pub fn values(&self) -> [T; 4] {
        [self.low, self.medium, self.high, self.extreme]
    }
}
