//! GARCH(1,1) parameters, estimation and one-step forecasting
//!
//! Conditional variance recursion:
//! sigma²_t = omega + alpha * eps²_{t-1} + beta * sigma²_{t-1}
//!
//! All quantities here live on the percentage scale (1.0 = 1%).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistence target used when a fit is pulled back inside the stationary region
pub const STATIONARITY_TARGET: f64 = 0.98;

/// Fewest returns a GARCH(1,1) fit accepts
pub const MIN_FIT_RETURNS: usize = 3;

/// Fitted GARCH(1,1) parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchParams {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// A fit whose persistence `alpha + beta` is at or above one
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Non-stationary GARCH fit: alpha + beta = {persistence}")]
pub struct NonStationaryFit {
    pub persistence: f64,
}

impl GarchParams {
    pub fn new(omega: f64, alpha: f64, beta: f64) -> Self {
        Self { omega, alpha, beta }
    }

    /// alpha + beta
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Check that the parameters are finite with omega > 0 and alpha, beta >= 0
    pub fn is_well_formed(&self) -> bool {
        self.omega.is_finite()
            && self.alpha.is_finite()
            && self.beta.is_finite()
            && self.omega > 0.0
            && self.alpha >= 0.0
            && self.beta >= 0.0
    }

    /// Fail when `alpha + beta >= 1`
    pub fn check_stationary(&self) -> Result<(), NonStationaryFit> {
        let persistence = self.persistence();
        if persistence >= 1.0 {
            return Err(NonStationaryFit { persistence });
        }
        Ok(())
    }

    /// Scale alpha and beta by `0.98 / (alpha + beta)`
    pub fn rescaled(&self, fit: NonStationaryFit) -> Self {
        let factor = STATIONARITY_TARGET / fit.persistence;
        Self {
            omega: self.omega,
            alpha: self.alpha * factor,
            beta: self.beta * factor,
        }
    }

    /// Return stationary parameters, rescaling when needed
    ///
    /// The second element reports whether a rescale happened.
    pub fn into_stationary(self) -> (Self, bool) {
        match self.check_stationary() {
            Ok(()) => (self, false),
            Err(fit) => (self.rescaled(fit), true),
        }
    }

    /// One-step-ahead conditional variance
    pub fn forecast_variance(&self, last_squared_return: f64, lagged_variance: f64) -> f64 {
        self.omega + self.alpha * last_squared_return + self.beta * lagged_variance
    }

    /// Long-run variance `omega / (1 - alpha - beta)`, if stationary
    pub fn unconditional_variance(&self) -> Option<f64> {
        let denom = 1.0 - self.persistence();
        (denom > 0.0).then(|| self.omega / denom)
    }
}

/// GARCH estimation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    /// Not enough returns to fit
    #[error("Too few returns to fit GARCH(1,1): {0}")]
    TooFewReturns(usize),
    /// Returns have no variance or contain non-finite values
    #[error("Return series is degenerate")]
    DegenerateSeries,
    /// Optimizer failed to find a finite likelihood
    #[error("GARCH optimizer did not converge")]
    NoConvergence,
    /// Estimator produced unusable parameters
    #[error("Invalid GARCH parameters: omega={omega}, alpha={alpha}, beta={beta}")]
    InvalidParameters { omega: f64, alpha: f64, beta: f64 },
    /// Fitting task was cancelled or panicked
    #[error("GARCH fit task failed: {0}")]
    TaskFailed(String),
}

/// Pluggable GARCH(1,1) parameter estimator
///
/// Implementations receive percentage-scaled returns, oldest first. Fitting is
/// CPU-bound and is always called from a blocking thread.
pub trait GarchEstimator: Send + Sync {
    /// Estimate (omega, alpha, beta)
    fn fit(&self, returns: &[f64]) -> Result<GarchParams, EstimatorError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Gaussian quasi-maximum-likelihood estimator using Nelder-Mead
#[derive(Debug, Clone)]
pub struct QuasiMleEstimator {
    /// Maximum simplex iterations
    pub max_iterations: usize,
    /// Stop when the simplex objective spread falls below this
    pub tolerance: f64,
}

impl QuasiMleEstimator {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }
}

impl Default for QuasiMleEstimator {
    fn default() -> Self {
        Self::new(2_000, 1e-9)
    }
}

impl GarchEstimator for QuasiMleEstimator {
    fn fit(&self, returns: &[f64]) -> Result<GarchParams, EstimatorError> {
        if returns.len() < MIN_FIT_RETURNS {
            return Err(EstimatorError::TooFewReturns(returns.len()));
        }
        if returns.iter().any(|r| !r.is_finite()) {
            return Err(EstimatorError::DegenerateSeries);
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let residuals: Vec<f64> = returns.iter().map(|r| r - mean).collect();
        let sample_var = residuals.iter().map(|e| e * e).sum::<f64>() / n;
        if sample_var <= f64::EPSILON {
            return Err(EstimatorError::DegenerateSeries);
        }

        let objective = |p: &[f64; 3]| negative_log_likelihood(p, &residuals, sample_var);
        let start = [sample_var * 0.05, 0.05, 0.90];
        let best = nelder_mead(&objective, start, self.max_iterations, self.tolerance);

        if !objective(&best).is_finite() {
            return Err(EstimatorError::NoConvergence);
        }

        Ok(GarchParams::new(best[0], best[1], best[2]))
    }

    fn name(&self) -> &'static str {
        "quasi-mle"
    }
}

/// Gaussian negative log-likelihood (constant terms dropped)
///
/// Infeasible parameters map to +inf so the simplex walks away from them.
fn negative_log_likelihood(params: &[f64; 3], residuals: &[f64], initial_variance: f64) -> f64 {
    let [omega, alpha, beta] = *params;
    if omega <= 0.0 || alpha < 0.0 || beta < 0.0 || alpha + beta >= 1.0 {
        return f64::INFINITY;
    }

    let mut variance = initial_variance;
    let mut nll = 0.0;
    for (i, &eps) in residuals.iter().enumerate() {
        if i > 0 {
            let prev = residuals[i - 1];
            variance = omega + alpha * prev * prev + beta * variance;
        }
        if variance <= 0.0 || !variance.is_finite() {
            return f64::INFINITY;
        }
        nll += variance.ln() + eps * eps / variance;
    }
    0.5 * nll
}

/// Downhill simplex minimisation over three parameters
fn nelder_mead<F>(f: F, start: [f64; 3], max_iterations: usize, tolerance: f64) -> [f64; 3]
where
    F: Fn(&[f64; 3]) -> f64,
{
    const REFLECT: f64 = 1.0;
    const EXPAND: f64 = 2.0;
    const CONTRACT: f64 = 0.5;
    const SHRINK: f64 = 0.5;

    let mut simplex: Vec<([f64; 3], f64)> = Vec::with_capacity(4);
    simplex.push((start, f(&start)));
    for i in 0..3 {
        let mut vertex = start;
        vertex[i] = if vertex[i].abs() > 1e-8 {
            vertex[i] * 0.9
        } else {
            0.001
        };
        let value = f(&vertex);
        simplex.push((vertex, value));
    }

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[3].1;
        if best.is_finite() && worst.is_finite() && (worst - best).abs() < tolerance {
            break;
        }

        let mut centroid = [0.0; 3];
        for (vertex, _) in &simplex[..3] {
            for j in 0..3 {
                centroid[j] += vertex[j] / 3.0;
            }
        }

        let worst_vertex = simplex[3].0;
        let toward = |coef: f64| -> [f64; 3] {
            let mut out = [0.0; 3];
            for j in 0..3 {
                out[j] = centroid[j] + coef * (worst_vertex[j] - centroid[j]);
            }
            out
        };

        let reflected = toward(-REFLECT);
        let reflected_value = f(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = toward(-EXPAND);
            let expanded_value = f(&expanded);
            simplex[3] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[2].1 {
            simplex[3] = (reflected, reflected_value);
            continue;
        }

        let contracted = toward(CONTRACT);
        let contracted_value = f(&contracted);
        if contracted_value < simplex[3].1 {
            simplex[3] = (contracted, contracted_value);
            continue;
        }

        let anchor = simplex[0].0;
        for entry in simplex.iter_mut().skip(1) {
            let mut vertex = entry.0;
            for j in 0..3 {
                vertex[j] = anchor[j] + SHRINK * (vertex[j] - anchor[j]);
            }
            *entry = (vertex, f(&vertex));
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex[0].0
}
