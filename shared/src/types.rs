//! Common types used across the engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Field location. Immutable once a request has been validated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64, elevation_m: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            elevation_m,
        }
    }

    /// Same location with a different elevation
    pub fn with_elevation(self, elevation_m: Option<f64>) -> Self {
        Self {
            elevation_m,
            ..self
        }
    }
}

/// Inclusive date range for historical queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_days_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        );
        assert_eq!(range.days(), 31);
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
    }

    #[test]
    fn test_with_elevation_keeps_position() {
        let coord = Coordinate::new(41.5, -93.6, None).with_elevation(Some(290.0));
        assert_eq!(coord.latitude, 41.5);
        assert_eq!(coord.elevation_m, Some(290.0));
    }
}
