//! Historical trend models and agronomic calculations
//!
//! Days without an observation are skipped, never imputed. Every average
//! and total in this module therefore covers observed days only; the
//! `missing_days` count reports how many days of the window were excluded.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::DateRange;

/// Default GDD base temperature (°C)
pub const DEFAULT_GDD_BASE_C: f64 = 10.0;
/// Days with less precipitation than this are dry (mm)
pub const DEFAULT_DRY_DAY_THRESHOLD_MM: f64 = 1.0;
/// Slopes within ±this are reported as stable (°C/day)
pub const STABLE_SLOPE_C_PER_DAY: f64 = 0.02;
/// Fewer observed days than this always yields a stable trend
const MIN_DAYS_FOR_TREND: usize = 3;

/// One day from the historical observation store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub temp_max_c: f64,
    pub temp_min_c: f64,
    pub precipitation_mm: f64,
}

impl DailyObservation {
    /// (min, max) with a swapped pair corrected
    pub fn ordered_extremes(&self) -> (f64, f64) {
        if self.temp_max_c < self.temp_min_c {
            (self.temp_max_c, self.temp_min_c)
        } else {
            (self.temp_min_c, self.temp_max_c)
        }
    }

    pub fn mean_temperature_c(&self) -> f64 {
        (self.temp_max_c + self.temp_min_c) / 2.0
    }
}

/// Growing degree days for one day: `max(0, (Tmax + Tmin) / 2 - base)`
pub fn growing_degree_days(temp_max_c: f64, temp_min_c: f64, base_c: f64) -> f64 {
    ((temp_max_c + temp_min_c) / 2.0 - base_c).max(0.0)
}

/// A day is dry when its precipitation is below the threshold
pub fn is_dry_day(precipitation_mm: f64, threshold_mm: f64) -> bool {
    precipitation_mm < threshold_mm
}

/// Least-squares slope of `(day offset, value)` pairs in units per day.
///
/// Returns 0.0 for fewer than two points or zero variance in x.
pub fn temperature_slope(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        (num + (x - mean_x) * (y - mean_y), den + (x - mean_x).powi(2))
    });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Direction of the daily mean temperature over the window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Warming,
    Cooling,
    Stable,
}

impl TrendDirection {
    pub fn from_slope(slope_c_per_day: f64) -> Self {
        if slope_c_per_day > STABLE_SLOPE_C_PER_DAY {
            TrendDirection::Warming
        } else if slope_c_per_day < -STABLE_SLOPE_C_PER_DAY {
            TrendDirection::Cooling
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemperaturePoint {
    pub date: NaiveDate,
    pub avg_temperature_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GddPoint {
    pub date: NaiveDate,
    pub gdd: f64,
    pub cumulative_gdd: f64,
}

/// Window statistics over observed days only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    /// Mean of daily mean temperatures; None when no day was observed
    pub avg_temperature: Option<f64>,
    pub total_precipitation: f64,
    pub dry_days: u32,
    pub wet_days: u32,
    pub observed_days: u32,
    /// Days in the window that had no observation
    pub missing_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub base_temperature_c: f64,
    pub temperature_trend: Vec<TemperaturePoint>,
    pub summary: TrendSummary,
    pub growing_degree_days: Vec<GddPoint>,
    pub trend_direction: TrendDirection,
    pub slope_c_per_day: f64,
}

/// Observations inside the window, one per date (first wins), ascending
pub fn normalize_observations(
    observations: &[DailyObservation],
    range: &DateRange,
) -> Vec<DailyObservation> {
    let mut by_date: BTreeMap<NaiveDate, DailyObservation> = BTreeMap::new();
    for obs in observations.iter().filter(|o| range.contains(o.date)) {
        by_date.entry(obs.date).or_insert(*obs);
    }
    by_date.into_values().collect()
}

/// Summary statistics for a window
pub fn summarize_observations(
    observations: &[DailyObservation],
    range: &DateRange,
    dry_threshold_mm: f64,
) -> TrendSummary {
    let days = normalize_observations(observations, range);
    let observed = days.len() as u32;
    let dry_days = days
        .iter()
        .filter(|d| is_dry_day(d.precipitation_mm, dry_threshold_mm))
        .count() as u32;
    let avg_temperature = if days.is_empty() {
        None
    } else {
        Some(days.iter().map(|d| d.mean_temperature_c()).sum::<f64>() / days.len() as f64)
    };

    TrendSummary {
        avg_temperature,
        total_precipitation: days.iter().map(|d| d.precipitation_mm).sum(),
        dry_days,
        wet_days: observed - dry_days,
        observed_days: observed,
        missing_days: (range.days().max(0) as u32).saturating_sub(observed),
    }
}

/// Build the full trend report for a window
pub fn build_trend_report(
    observations: &[DailyObservation],
    range: &DateRange,
    base_temperature_c: f64,
    dry_threshold_mm: f64,
) -> TrendReport {
    let days = normalize_observations(observations, range);

    let temperature_trend: Vec<TemperaturePoint> = days
        .iter()
        .map(|d| {
            let (min, max) = d.ordered_extremes();
            TemperaturePoint {
                date: d.date,
                avg_temperature_c: d.mean_temperature_c(),
                temp_min_c: min,
                temp_max_c: max,
            }
        })
        .collect();

    let mut cumulative = 0.0;
    let growing_degree_days = days
        .iter()
        .map(|d| {
            let (min, max) = d.ordered_extremes();
            let gdd = growing_degree_days(max, min, base_temperature_c);
            cumulative += gdd;
            GddPoint {
                date: d.date,
                gdd,
                cumulative_gdd: cumulative,
            }
        })
        .collect();

    let points: Vec<(f64, f64)> = temperature_trend
        .iter()
        .map(|p| ((p.date - range.start).num_days() as f64, p.avg_temperature_c))
        .collect();
    let slope = temperature_slope(&points);
    let trend_direction = if points.len() < MIN_DAYS_FOR_TREND {
        TrendDirection::Stable
    } else {
        TrendDirection::from_slope(slope)
    };

    TrendReport {
        start_date: range.start,
        end_date: range.end,
        base_temperature_c,
        summary: summarize_observations(&days, range, dry_threshold_mm),
        temperature_trend,
        growing_degree_days,
        trend_direction,
        slope_c_per_day: slope,
    }
}
