//! GARCH-backed volatility model with refresh policy

use super::garch::{EstimatorError, GarchEstimator};
use super::returns::{absolute_change, ReturnSeries};
use super::types::{RefreshTrigger, VolatilityError, VolatilityForecast};
use crate::config::VolatilityConfig;
use crate::store::{ForecastStore, PriceHistory};
use crate::telemetry::{
    increment_counter, record_latency, set_pair_gauge, CounterMetric, LatencyMetric,
    PairGaugeMetric,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Produces and caches per-pair volatility forecasts
pub struct VolatilityModel {
    prices: Arc<dyn PriceHistory>,
    forecasts: Arc<dyn ForecastStore>,
    estimator: Arc<dyn GarchEstimator>,
    config: VolatilityConfig,
}

impl VolatilityModel {
    pub fn new(
        prices: Arc<dyn PriceHistory>,
        forecasts: Arc<dyn ForecastStore>,
        estimator: Arc<dyn GarchEstimator>,
        config: VolatilityConfig,
    ) -> Self {
        Self {
            prices,
            forecasts,
            estimator,
            config,
        }
    }

    pub fn config(&self) -> &VolatilityConfig {
        &self.config
    }

    /// Current forecast for `pair`, refitting when stale or after an extreme move
    pub async fn refresh(&self, pair: &str) -> Result<VolatilityForecast, VolatilityError> {
        self.refresh_at(pair, Utc::now()).await
    }

    /// [`refresh`](Self::refresh) against an explicit clock
    pub async fn refresh_at(
        &self,
        pair: &str,
        now: DateTime<Utc>,
    ) -> Result<VolatilityForecast, VolatilityError> {
        let trigger = match self.forecasts.latest_forecast(pair).await? {
            None => RefreshTrigger::Initial,
            Some(latest) => {
                let interval = Duration::hours(i64::from(self.config.update_interval_hours));
                if latest.age(now) >= interval {
                    RefreshTrigger::Scheduled
                } else if self.detect_extreme_move(pair, now).await? {
                    RefreshTrigger::ExtremeMove
                } else {
                    debug!(
                        pair,
                        forecast_id = %latest.id,
                        age_minutes = latest.age(now).num_minutes(),
                        "Reusing volatility forecast"
                    );
                    return Ok(latest);
                }
            }
        };

        let forecast = self.fit_forecast(pair, now, trigger).await?;
        self.forecasts.insert_forecast(&forecast).await?;

        increment_counter(CounterMetric::ForecastRefresh(trigger.as_str()));
        set_pair_gauge(
            PairGaugeMetric::DailyVolatility,
            pair,
            forecast.daily_volatility,
        );
        info!(
            pair,
            trigger = trigger.as_str(),
            daily_volatility = forecast.daily_volatility,
            regime = %forecast.regime,
            observations = forecast.observations,
            "Volatility forecast refreshed"
        );

        Ok(forecast)
    }

    /// Whether price moved at least the threshold over the extreme-move window
    ///
    /// Missing prices on either side count as no move.
    pub async fn detect_extreme_move(
        &self,
        pair: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, VolatilityError> {
        let window = Duration::minutes(i64::from(self.config.extreme_move_window_minutes));

        let Some(current) = self.prices.close_at_or_before(pair, now).await? else {
            return Ok(false);
        };
        let Some(prior) = self.prices.close_at_or_before(pair, now - window).await? else {
            return Ok(false);
        };

        let moved = absolute_change(prior.close, current.close)
            .map(|change| change >= self.config.extreme_move_threshold)
            .unwrap_or(false);

        if moved {
            warn!(
                pair,
                prior = %prior.close,
                current = %current.close,
                "Extreme price move detected"
            );
        }
        Ok(moved)
    }

    /// Fit GARCH(1,1) over the lookback window and forecast one period ahead
    async fn fit_forecast(
        &self,
        pair: &str,
        now: DateTime<Utc>,
        trigger: RefreshTrigger,
    ) -> Result<VolatilityForecast, VolatilityError> {
        let from = now - Duration::days(i64::from(self.config.lookback_days));
        let closes = self.prices.closes_between(pair, from, now).await?;
        let series = ReturnSeries::from_closes(closes.iter().map(|p| &p.close));

        if series.len() < self.config.min_observations {
            return Err(VolatilityError::InsufficientData {
                pair: pair.to_string(),
                observations: series.len(),
                required: self.config.min_observations,
            });
        }

        let estimator = self.estimator.clone();
        let returns = series.percent();
        let started = Instant::now();
        let fitted = tokio::task::spawn_blocking(move || estimator.fit(&returns))
            .await
            .map_err(|e| EstimatorError::TaskFailed(e.to_string()))??;
        record_latency(LatencyMetric::GarchFit, started.elapsed());

        if !fitted.is_well_formed() {
            return Err(EstimatorError::InvalidParameters {
                omega: fitted.omega,
                alpha: fitted.alpha,
                beta: fitted.beta,
            }
            .into());
        }

        let (params, rescaled) = fitted.into_stationary();
        if rescaled {
            warn!(
                pair,
                estimator = self.estimator.name(),
                persistence = fitted.persistence(),
                "Non-stationary GARCH fit rescaled"
            );
        }

        let last_squared = series.last_squared_percent().unwrap_or(0.0);
        let lagged = series
            .realized_variance_percent(self.config.realized_variance_window)
            .unwrap_or(0.0);
        let variance = params.forecast_variance(last_squared, lagged);
        let daily_volatility =
            variance.max(0.0).sqrt() / 100.0 * self.config.periods_per_day.sqrt();

        if !daily_volatility.is_finite() || daily_volatility <= 0.0 {
            return Err(EstimatorError::InvalidParameters {
                omega: params.omega,
                alpha: params.alpha,
                beta: params.beta,
            }
            .into());
        }

        let regime = self.config.bands_for(pair).classify(daily_volatility);

        Ok(VolatilityForecast::new(
            pair,
            daily_volatility,
            regime,
            params,
            series.len(),
            trigger,
            now,
        ))
    }

    /// Most recent stored forecast
    pub async fn latest(&self, pair: &str) -> Result<Option<VolatilityForecast>, VolatilityError> {
        Ok(self.forecasts.latest_forecast(pair).await?)
    }

    /// Stored forecasts within `[from, to]`, newest first
    pub async fn history(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolatilityForecast>, VolatilityError> {
        Ok(self.forecasts.forecasts_between(pair, from, to).await?)
    }
}
