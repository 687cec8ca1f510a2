//! Engine error types

use crate::portfolio::PortfolioError;
use crate::risk::RiskError;
use crate::store::StoreError;
use crate::volatility::{EstimatorError, VolatilityError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable error category callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientData,
    Estimator,
    InvalidInput,
    Persistence,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::Estimator => "estimator",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Persistence => "persistence",
            ErrorKind::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Too little price history to forecast volatility
    #[error("Insufficient data for {pair}: {observations} returns, need {required}")]
    InsufficientData {
        pair: String,
        observations: usize,
        required: usize,
    },
    /// GARCH estimation failed
    #[error("Volatility estimation failed: {0}")]
    Estimator(#[from] EstimatorError),
    /// A caller-supplied value was out of range
    #[error(transparent)]
    InvalidInput(#[from] RiskError),
    /// Storage read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    /// No decision matched the update target
    #[error("No decision found for {0}")]
    DecisionNotFound(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InsufficientData { .. } => ErrorKind::InsufficientData,
            EngineError::Estimator(_) => ErrorKind::Estimator,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Persistence(_) => ErrorKind::Persistence,
            EngineError::DecisionNotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<VolatilityError> for EngineError {
    fn from(err: VolatilityError) -> Self {
        match err {
            VolatilityError::InsufficientData {
                pair,
                observations,
                required,
            } => EngineError::InsufficientData {
                pair,
                observations,
                required,
            },
            VolatilityError::Estimator(e) => EngineError::Estimator(e),
            VolatilityError::Store(e) => EngineError::Persistence(e),
        }
    }
}

impl From<PortfolioError> for EngineError {
    fn from(err: PortfolioError) -> Self {
        match err {
            PortfolioError::Invalid(e) => EngineError::InvalidInput(e),
            PortfolioError::Store(e) => EngineError::Persistence(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatility_errors_keep_their_kind() {
        let err: EngineError = VolatilityError::InsufficientData {
            pair: "BTCZAR".to_string(),
            observations: 10,
            required: 60,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let err: EngineError = VolatilityError::Estimator(EstimatorError::NoConvergence).into();
        assert_eq!(err.kind(), ErrorKind::Estimator);

        let err: EngineError =
            VolatilityError::Store(StoreError::Corrupt("bad row".to_string())).into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_portfolio_errors_keep_their_kind() {
        let err: EngineError =
            PortfolioError::Invalid(RiskError::invalid("total_value", -1, "non-negative")).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.kind().as_str(), "invalid_input");
    }
}
