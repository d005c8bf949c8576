//! Validation utilities for the Agrocast engine
//!
//! Every check here runs before any provider or store I/O.

use chrono::NaiveDate;

use crate::types::{Coordinate, DateRange};

/// Lowest land elevation considered valid (Dead Sea shore is ~-430 m)
pub const MIN_ELEVATION_M: f64 = -500.0;
/// Highest elevation considered valid for a farmed field
pub const MAX_ELEVATION_M: f64 = 9000.0;
/// Maximum length of a field identifier
pub const MAX_FIELD_ID_LEN: usize = 128;

// ============================================================================
// Location Validations
// ============================================================================

/// Validate latitude is finite and within [-90, 90]
pub fn validate_latitude(latitude: f64) -> Result<(), &'static str> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    Ok(())
}

/// Validate longitude is finite and within [-180, 180]
pub fn validate_longitude(longitude: f64) -> Result<(), &'static str> {
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Validate elevation in meters
pub fn validate_elevation(elevation_m: f64) -> Result<(), &'static str> {
    if !elevation_m.is_finite() || !(MIN_ELEVATION_M..=MAX_ELEVATION_M).contains(&elevation_m) {
        return Err("Elevation must be between -500 and 9000 meters");
    }
    Ok(())
}

/// Validate a full coordinate
pub fn validate_coordinate(coordinate: &Coordinate) -> Result<(), &'static str> {
    validate_latitude(coordinate.latitude)?;
    validate_longitude(coordinate.longitude)?;
    if let Some(elevation) = coordinate.elevation_m {
        validate_elevation(elevation)?;
    }
    Ok(())
}

/// Validate urban density estimate is a fraction
pub fn validate_urban_density(density: f64) -> Result<(), &'static str> {
    if !density.is_finite() || !(0.0..=1.0).contains(&density) {
        return Err("Urban density must be between 0 and 1");
    }
    Ok(())
}

// ============================================================================
// Request Validations
// ============================================================================

/// Validate field identifier (non-blank, bounded, no control characters)
pub fn validate_field_id(field_id: &str) -> Result<(), &'static str> {
    if field_id.trim().is_empty() {
        return Err("Field ID must not be empty");
    }
    if field_id.len() > MAX_FIELD_ID_LEN {
        return Err("Field ID must be at most 128 characters");
    }
    if field_id.chars().any(|c| c.is_control()) {
        return Err("Field ID must not contain control characters");
    }
    Ok(())
}

/// Validate a historical query window
pub fn validate_date_range(
    range: &DateRange,
    today: NaiveDate,
    max_window_days: i64,
) -> Result<(), &'static str> {
    if range.start > range.end {
        return Err("Start date must not be after end date");
    }
    if range.end > today {
        return Err("End date must not be in the future");
    }
    if range.days() > max_window_days {
        return Err("Date range exceeds the maximum window");
    }
    Ok(())
}
