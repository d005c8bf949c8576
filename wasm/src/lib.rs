//! WebAssembly module for the Agrocast engine
//!
//! Provides client-side computation for:
//! - Growing degree days and dry/wet day classification
//! - Trend summaries over locally cached observations
//! - Lapse-rate temperature correction
//! - Offline coordinate validation

use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

#[derive(Debug, Deserialize)]
struct SummaryRequest {
    range: DateRange,
    observations: Vec<DailyObservation>,
    #[serde(default = "default_dry_threshold")]
    dry_threshold_mm: f64,
}

fn default_dry_threshold() -> f64 {
    DEFAULT_DRY_DAY_THRESHOLD_MM
}

/// Growing degree days for one day
#[wasm_bindgen]
pub fn calculate_gdd(temp_max_c: f64, temp_min_c: f64, base_c: f64) -> f64 {
    growing_degree_days(temp_max_c, temp_min_c, base_c)
}

/// "dry" or "wet" using the default threshold
#[wasm_bindgen]
pub fn classify_precipitation_day(precipitation_mm: f64) -> String {
    if is_dry_day(precipitation_mm, DEFAULT_DRY_DAY_THRESHOLD_MM) {
        "dry".to_string()
    } else {
        "wet".to_string()
    }
}

/// Temperature offset for a field relative to a model grid cell
#[wasm_bindgen]
pub fn calculate_lapse_rate_adjustment(field_elevation_m: f64, reference_elevation_m: f64) -> f64 {
    lapse_rate_adjustment(field_elevation_m, reference_elevation_m)
}

/// Empty string when valid, otherwise the reason
#[wasm_bindgen]
pub fn check_coordinate(latitude: f64, longitude: f64, elevation_m: Option<f64>) -> String {
    coordinate_error(latitude, longitude, elevation_m)
        .unwrap_or_default()
        .to_string()
}

/// Summarize observations; takes `{ range, observations, dry_threshold_mm? }`
#[wasm_bindgen]
pub fn summarize_observations_json(request_json: &str) -> Result<String, JsValue> {
    summarize(request_json).map_err(|e| JsValue::from_str(&e))
}

fn coordinate_error(latitude: f64, longitude: f64, elevation_m: Option<f64>) -> Option<&'static str> {
    validate_coordinate(&Coordinate::new(latitude, longitude, elevation_m)).err()
}

fn summarize(request_json: &str) -> Result<String, String> {
    let request: SummaryRequest = serde_json::from_str(request_json)
        .map_err(|e| format!("Invalid summary request JSON: {}", e))?;
    if request.range.start > request.range.end {
        return Err("Start date must not be after end date".to_string());
    }
    let summary = summarize_observations(&request.observations, &request.range, request.dry_threshold_mm);
    serde_json::to_string(&summary).map_err(|e| format!("Failed to encode summary: {}", e))
}
