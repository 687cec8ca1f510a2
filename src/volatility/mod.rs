//! Volatility module
//!
//! GARCH(1,1) forecasting, regime classification and the refresh policy

mod garch;
mod model;
mod regime;
mod returns;
mod types;

pub use garch::{
    EstimatorError, GarchEstimator, GarchParams, NonStationaryFit, QuasiMleEstimator,
    MIN_FIT_RETURNS, STATIONARITY_TARGET,
};
pub use model::VolatilityModel;
pub use regime::{RegimeBands, RegimeTable, VolatilityRegime};
pub use returns::{absolute_change, population_variance, ReturnSeries};
pub use types::{RefreshTrigger, VolatilityError, VolatilityForecast, TRADING_DAYS_PER_YEAR};
