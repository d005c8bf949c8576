//! Route definitions for the Agrocast API

use axum::{routing::get, Router};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/forecast", forecast_routes())
        .route("/trends", get(handlers::get_weather_trends))
}

/// Forecast routes
fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_field_forecast))
        .route("/crop", get(handlers::get_crop_forecast))
}
