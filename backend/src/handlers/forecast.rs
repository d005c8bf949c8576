//! HTTP handlers for forecast endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{ConsensusForecast, CropAdvisory};
use validator::Validate;

use crate::error::AppResult;
use crate::AppState;

/// Query parameters for a field forecast
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForecastQuery {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    #[validate(range(min = -500.0, max = 9000.0, message = "Elevation must be between -500 and 9000 meters"))]
    pub elevation: Option<f64>,
    #[validate(length(min = 1, max = 128, message = "Field ID must be 1 to 128 characters"))]
    pub field_id: String,
}

/// Get the consensus forecast for a field
pub async fn get_field_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Json<Arc<ConsensusForecast>>> {
    query.validate()?;
    let forecast = state
        .forecast
        .get_field_forecast(query.latitude, query.longitude, query.elevation, &query.field_id)
        .await?;
    Ok(Json(forecast))
}

/// Query parameters for a crop-specific forecast
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CropForecastQuery {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    pub crop_type: String,
    pub growth_stage: String,
    #[validate(length(min = 1, max = 128, message = "Field ID must be 1 to 128 characters"))]
    pub field_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropForecastResponse {
    pub forecast: Arc<ConsensusForecast>,
    pub advisory: CropAdvisory,
}

/// Get a forecast with crop and growth stage advisory
pub async fn get_crop_forecast(
    State(state): State<AppState>,
    Query(query): Query<CropForecastQuery>,
) -> AppResult<Json<CropForecastResponse>> {
    query.validate()?;
    let (forecast, advisory) = state
        .forecast
        .get_crop_specific_forecast(
            query.latitude,
            query.longitude,
            &query.crop_type,
            &query.growth_stage,
            &query.field_id,
        )
        .await?;
    Ok(Json(CropForecastResponse { forecast, advisory }))
}
