//! External weather provider integrations
//!
//! Each adapter normalizes one upstream source into `RawProviderSeries`
//! with fixed units (°C, %, m/s, hPa, mm per hour), so the rest of the
//! pipeline only ever sees the common schema.

pub mod met_norway;
pub mod open_meteo;
pub mod openweathermap;
pub mod units;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{Coordinate, ForecastWindow, RawProviderSeries};
use thiserror::Error;

use crate::config::ProvidersConfig;
use crate::error::{AppError, AppResult};

pub use met_norway::MetNorwayProvider;
pub use open_meteo::OpenMeteoProvider;
pub use openweathermap::OpenWeatherMapProvider;

/// Failure of a single provider call. Recovered by the aggregator, never
/// surfaced to callers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Provider returned no samples")]
    EmptyPayload,

    #[error("Provider payload rejected: {0}")]
    InvalidPayload(String),

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider task failed: {0}")]
    TaskFailed(String),
}

/// Contract every weather data source satisfies.
///
/// Implementations must tolerate concurrent calls. Cancellation is by
/// dropping the returned future.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Stable identifier reported in forecast metadata
    fn source_id(&self) -> &str;

    /// Fusion weight for this source
    fn reliability(&self) -> f64 {
        1.0
    }

    async fn fetch(
        &self,
        coordinate: &Coordinate,
        window: &ForecastWindow,
    ) -> Result<RawProviderSeries, ProviderError>;
}

/// Turn a non-success response into a `ProviderError::Status`
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

/// Construct every provider enabled in configuration
pub fn build_providers(config: &ProvidersConfig) -> AppResult<Vec<Arc<dyn WeatherProvider>>> {
    let client = Client::builder()
        .connect_timeout(config.per_provider_timeout())
        .build()
        .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

    let mut providers: Vec<Arc<dyn WeatherProvider>> = Vec::new();

    if config.open_meteo.enabled {
        providers.push(Arc::new(OpenMeteoProvider::new(
            client.clone(),
            config.open_meteo.clone(),
        )));
    }

    if let Some(api_key) = config.openweathermap.api_key.as_ref().filter(|k| !k.is_empty()) {
        providers.push(Arc::new(OpenWeatherMapProvider::new(
            client.clone(),
            api_key.clone(),
            config.openweathermap.clone(),
        )?));
    }

    if config.met_norway.enabled {
        providers.push(Arc::new(MetNorwayProvider::new(
            client.clone(),
            config.met_norway.clone(),
        )));
    }

    if providers.is_empty() {
        return Err(AppError::Configuration(
            "no weather providers are enabled".to_string(),
        ));
    }

    tracing::info!(
        providers = ?providers.iter().map(|p| p.source_id().to_string()).collect::<Vec<_>>(),
        "Weather providers configured"
    );

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;

    #[test]
    fn test_build_providers_defaults() {
        let providers = build_providers(&ProvidersConfig::default()).unwrap();
        let ids: Vec<_> = providers.iter().map(|p| p.source_id().to_string()).collect();
        assert_eq!(ids, vec!["open-meteo", "met-norway"]);
    }

    #[test]
    fn test_build_providers_with_owm_key() {
        let mut config = ProvidersConfig::default();
        config.openweathermap.api_key = Some("key".to_string());
        let providers = build_providers(&config).unwrap();
        assert_eq!(providers.len(), 3);
    }

    #[test]
    fn test_build_providers_none_enabled() {
        let mut config = ProvidersConfig::default();
        config.open_meteo.enabled = false;
        config.met_norway.enabled = false;
        assert!(build_providers(&config).is_err());
    }
}
