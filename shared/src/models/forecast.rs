//! Forecast data models

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::WeatherAlert;
use crate::types::Coordinate;

/// Hourly samples kept in a consensus forecast
pub const HOURLY_HORIZON: usize = 48;
/// Daily summaries kept in a consensus forecast
pub const DAILY_HORIZON: usize = 7;

/// One normalized observation or forecast step.
///
/// Units are fixed: °C, %, m/s, hPa, and mm accumulated over the hour
/// starting at `timestamp`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_mps: f64,
    pub pressure_hpa: f64,
    pub precipitation_mm: f64,
}

impl WeatherSample {
    /// Every metric is finite and physically plausible
    pub fn is_plausible(&self) -> bool {
        let values = [
            self.temperature_c,
            self.humidity_pct,
            self.wind_speed_mps,
            self.pressure_hpa,
            self.precipitation_mm,
        ];
        values.iter().all(|v| v.is_finite())
            && (-90.0..=60.0).contains(&self.temperature_c)
            && (0.0..=100.0).contains(&self.humidity_pct)
            && self.wind_speed_mps >= 0.0
            && (800.0..=1100.0).contains(&self.pressure_hpa)
            && self.precipitation_mm >= 0.0
    }
}

/// Truncate a timestamp to the start of its UTC hour
pub fn hour_bucket(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let secs = timestamp.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(timestamp)
}

/// Standard atmospheric lapse rate (°C per 1000 m)
pub const LAPSE_RATE_C_PER_KM: f64 = 6.5;

/// Temperature delta for a field at `field_elevation_m` relative to a
/// model grid cell at `reference_elevation_m`
pub fn lapse_rate_adjustment(field_elevation_m: f64, reference_elevation_m: f64) -> f64 {
    -LAPSE_RATE_C_PER_KM * (field_elevation_m - reference_elevation_m) / 1000.0
}

/// Forecast window requested from a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastWindow {
    pub start: DateTime<Utc>,
    pub hours: u32,
}

impl ForecastWindow {
    pub fn starting_now(horizon_days: u32) -> Self {
        Self {
            start: hour_bucket(Utc::now()),
            hours: horizon_days * 24,
        }
    }

    pub fn days(&self) -> u32 {
        self.hours.div_ceil(24)
    }
}

/// Normalized output of one provider call. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProviderSeries {
    pub source: String,
    /// Elevation of the provider's model grid cell, if reported
    pub model_elevation_m: Option<f64>,
    pub samples: Vec<WeatherSample>,
    pub fetched_at: DateTime<Utc>,
}

/// Fused hourly series flowing through the adjustment stage
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusSeries {
    /// Hourly, ascending by timestamp
    pub samples: Vec<WeatherSample>,
    pub reference_elevation_m: Option<f64>,
}

/// Static classifiers for a field, supplied by the metadata collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldContext {
    pub field_id: String,
    pub coordinate: Coordinate,
    pub near_water: bool,
    /// Built-up fraction around the field, 0..=1
    pub urban_density: Option<f64>,
}

impl FieldContext {
    /// Context with no static classifiers
    pub fn plain(field_id: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            field_id: field_id.into(),
            coordinate,
            near_water: false,
            urban_density: None,
        }
    }
}

/// Local correction factors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentFactor {
    Elevation,
    WaterProximity,
    UrbanHeatIsland,
}

impl std::fmt::Display for AdjustmentFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentFactor::Elevation => write!(f, "elevation"),
            AdjustmentFactor::WaterProximity => write!(f, "water-proximity"),
            AdjustmentFactor::UrbanHeatIsland => write!(f, "urban-heat-island"),
        }
    }
}

/// A correction applied to the consensus series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub factor: AdjustmentFactor,
    /// Signed magnitude (°C for temperature offsets, percent for range damping)
    pub magnitude: f64,
    pub description: String,
}

/// Daily roll-up of the adjusted hourly series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub temp_mean_c: f64,
    pub humidity_mean_pct: f64,
    pub wind_max_mps: f64,
    pub pressure_mean_hpa: f64,
    pub precipitation_mm: f64,
}

impl DailySummary {
    /// Summarize one day's samples. Returns None for an empty slice.
    pub fn from_samples(date: NaiveDate, samples: &[WeatherSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let temps = samples.iter().map(|s| s.temperature_c);
        Some(Self {
            date,
            temp_min_c: temps.clone().fold(f64::INFINITY, f64::min),
            temp_max_c: temps.clone().fold(f64::NEG_INFINITY, f64::max),
            temp_mean_c: temps.sum::<f64>() / n,
            humidity_mean_pct: samples.iter().map(|s| s.humidity_pct).sum::<f64>() / n,
            wind_max_mps: samples.iter().map(|s| s.wind_speed_mps).fold(0.0, f64::max),
            pressure_mean_hpa: samples.iter().map(|s| s.pressure_hpa).sum::<f64>() / n,
            precipitation_mm: samples.iter().map(|s| s.precipitation_mm).sum(),
        })
    }
}

/// Provenance and quality of a consensus forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastMetadata {
    pub forecast_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub failed_sources: Vec<String>,
    /// In [0, 1], never 1.0
    pub confidence: f64,
    /// In order of application
    pub adjustments: Vec<Adjustment>,
}

/// Field-specific consensus forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusForecast {
    pub field_id: String,
    pub coordinate: Coordinate,
    pub current: WeatherSample,
    pub hourly: Vec<WeatherSample>,
    pub daily: Vec<DailySummary>,
    pub alerts: Vec<WeatherAlert>,
    pub metadata: ForecastMetadata,
}

impl ConsensusForecast {
    /// Build the forecast view from an adjusted series.
    ///
    /// Buckets before the hour containing `metadata.issued_at` are dropped.
    /// Returns None when nothing at or after that hour remains.
    pub fn assemble(
        field_id: impl Into<String>,
        coordinate: Coordinate,
        series: &ConsensusSeries,
        metadata: ForecastMetadata,
    ) -> Option<Self> {
        let start = hour_bucket(metadata.issued_at);
        let upcoming: Vec<WeatherSample> = series
            .samples
            .iter()
            .filter(|s| s.timestamp >= start)
            .copied()
            .collect();
        let current = *upcoming.first()?;

        let mut by_day: BTreeMap<NaiveDate, Vec<WeatherSample>> = BTreeMap::new();
        for sample in &upcoming {
            by_day.entry(sample.timestamp.date_naive()).or_default().push(*sample);
        }
        let daily = by_day
            .iter()
            .filter_map(|(date, samples)| DailySummary::from_samples(*date, samples))
            .take(DAILY_HORIZON)
            .collect();

        Some(Self {
            field_id: field_id.into(),
            coordinate,
            current,
            hourly: upcoming.into_iter().take(HOURLY_HORIZON).collect(),
            daily,
            alerts: Vec::new(),
            metadata,
        })
    }

    /// `current` followed by the hourly samples, without repeating the current hour
    pub fn evaluation_window(&self) -> Vec<WeatherSample> {
        let mut window = Vec::with_capacity(self.hourly.len() + 1);
        window.push(self.current);
        window.extend(
            self.hourly
                .iter()
                .filter(|s| s.timestamp != self.current.timestamp)
                .take(HOURLY_HORIZON),
        );
        window
    }
}
