//! Agrocast - hyperlocal agricultural weather forecasting engine
//!
//! Fuses several weather providers into a field-specific consensus
//! forecast, corrects it for local topography, raises hazard alerts and
//! derives crop advisories and historical agronomic trends.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{ForecastService, TrendService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub forecast: ForecastService,
    pub trends: TrendService,
    pub db: Option<sqlx::PgPool>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Agrocast Forecasting API v1"
}
