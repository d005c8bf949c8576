//! Historical weather trends

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use shared::{
    build_trend_report, validate_date_range, validate_latitude, validate_longitude, Coordinate,
    DateRange, TrendReport,
};

use crate::config::TrendConfig;
use crate::error::{AppError, AppResult};
use crate::services::HistoricalObservationStore;

/// Computes trend reports from the observation store. Reports are never cached.
#[derive(Clone)]
pub struct TrendService {
    store: Arc<dyn HistoricalObservationStore>,
    config: TrendConfig,
}

impl TrendService {
    pub fn new(store: Arc<dyn HistoricalObservationStore>, config: TrendConfig) -> Self {
        Self { store, config }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_weather_trends(
        &self,
        latitude: f64,
        longitude: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AppResult<TrendReport> {
        validate_latitude(latitude).map_err(|m| AppError::validation("latitude", m))?;
        validate_longitude(longitude).map_err(|m| AppError::validation("longitude", m))?;

        let range = DateRange::new(start_date, end_date);
        validate_date_range(&range, Utc::now().date_naive(), self.config.max_window_days)
            .map_err(|m| AppError::validation("dateRange", m))?;

        let coordinate = Coordinate::new(latitude, longitude, None);
        let observations = self.store.query(&coordinate, start_date, end_date).await?;

        let report = build_trend_report(
            &observations,
            &range,
            self.config.base_temperature_c,
            self.config.dry_day_threshold_mm,
        );

        tracing::debug!(
            observed_days = report.summary.observed_days,
            missing_days = report.summary.missing_days,
            direction = ?report.trend_direction,
            "Trend report computed"
        );

        Ok(report)
    }
}
