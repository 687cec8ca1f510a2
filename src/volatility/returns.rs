//! Return series built from historical closes

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Log returns from an ordered close series
#[derive(Debug, Clone, Default)]
pub struct ReturnSeries {
    returns: Vec<f64>,
}

impl ReturnSeries {
    /// Build log returns from closes ordered oldest first
    ///
    /// Non-positive closes are skipped together with the return that would
    /// straddle them.
    pub fn from_closes<'a>(closes: impl IntoIterator<Item = &'a Decimal>) -> Self {
        let mut returns = Vec::new();
        let mut prev: Option<f64> = None;

        for close in closes {
            let curr = close.to_f64().unwrap_or(0.0);
            if curr <= 0.0 || !curr.is_finite() {
                prev = None;
                continue;
            }
            if let Some(p) = prev {
                returns.push((curr / p).ln());
            }
            prev = Some(curr);
        }

        Self { returns }
    }

    /// Wrap precomputed decimal-scale returns
    pub fn from_returns(returns: Vec<f64>) -> Self {
        Self { returns }
    }

    /// Number of returns
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Returns on decimal scale (0.01 = 1%)
    pub fn as_slice(&self) -> &[f64] {
        &self.returns
    }

    /// Returns on percentage scale (1.0 = 1%), the scale the GARCH fit runs on
    pub fn percent(&self) -> Vec<f64> {
        self.returns.iter().map(|r| r * 100.0).collect()
    }

    /// Square of the latest percentage return
    pub fn last_squared_percent(&self) -> Option<f64> {
        self.returns.last().map(|r| (r * 100.0).powi(2))
    }

    /// Variance of the trailing `window` percentage returns
    ///
    /// Uses every available return when fewer than `window` exist.
    pub fn realized_variance_percent(&self, window: usize) -> Option<f64> {
        if self.returns.is_empty() || window == 0 {
            return None;
        }
        let start = self.returns.len().saturating_sub(window);
        let tail: Vec<f64> = self.returns[start..].iter().map(|r| r * 100.0).collect();
        population_variance(&tail)
    }
}

/// Population variance
pub fn population_variance(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
}

/// Absolute fractional change between two prices
pub fn absolute_change(from: Decimal, to: Decimal) -> Option<Decimal> {
    if from <= Decimal::ZERO {
        return None;
    }
    Some(((to - from) / from).abs())
}
