//! HTTP handlers for historical trends

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::TrendReport;
use validator::Validate;

use crate::error::AppResult;
use crate::AppState;

/// Query parameters for a trend report
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Get weather trends for a location and date range
pub async fn get_weather_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<TrendReport>> {
    query.validate()?;
    let report = state
        .trends
        .get_weather_trends(query.latitude, query.longitude, query.start_date, query.end_date)
        .await?;
    Ok(Json(report))
}
