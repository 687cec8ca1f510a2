//! Signal types

use crate::risk::RiskError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction emitted by the prediction model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    /// Open or add to a long position
    Buy,
    /// Open or add to a short position
    Sell,
    /// Stay flat
    Hold,
}

impl Signal {
    /// Stable upper-case tag used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }

    /// Whether this signal can ever lead to a position
    pub fn is_directional(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            other => Err(format!("unknown signal: {other}")),
        }
    }
}

/// A model output entering the risk engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInput {
    /// Trading pair, e.g. "BTCZAR"
    pub pair: String,
    /// Trade direction
    pub signal: Signal,
    /// Model confidence in [0, 1]
    pub confidence: Decimal,
    /// Highest class probability reported by the model, if any
    pub max_probability: Option<Decimal>,
    /// When the signal was received
    pub timestamp: DateTime<Utc>,
}

impl SignalInput {
    /// Create a new signal input stamped with the current time
    pub fn new(pair: impl Into<String>, signal: Signal, confidence: Decimal) -> Self {
        Self {
            pair: pair.into(),
            signal,
            confidence,
            max_probability: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the model's maximum class probability
    pub fn with_max_probability(mut self, max_probability: Decimal) -> Self {
        self.max_probability = Some(max_probability);
        self
    }

    /// Check ranges before any I/O happens
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.pair.trim().is_empty() {
            return Err(RiskError::invalid("pair", &self.pair, "a non-empty pair"));
        }
        RiskError::check_probability("confidence", self.confidence)?;
        if let Some(p) = self.max_probability {
            RiskError::check_probability("max_probability", p)?;
        }
        Ok(())
    }
}
