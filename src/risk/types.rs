//! Risk management types

use rust_decimal::Decimal;
use thiserror::Error;

/// Risk management errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RiskError {
    /// An input fell outside its valid range
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidInput {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl RiskError {
    /// Build an `InvalidInput` error
    pub fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        RiskError::InvalidInput {
            field,
            value: value.to_string(),
            expected,
        }
    }

    /// Fail unless `value` lies in [0, 1]
    pub fn check_probability(field: &'static str, value: Decimal) -> Result<(), RiskError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(Self::invalid(field, value, "a value in [0, 1]"));
        }
        Ok(())
    }

    /// Fail if `value` is negative
    pub fn check_non_negative(field: &'static str, value: Decimal) -> Result<(), RiskError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Self::invalid(field, value, "a non-negative value"));
        }
        Ok(())
    }
}
