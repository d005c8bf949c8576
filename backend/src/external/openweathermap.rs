//! OpenWeatherMap API client
//!
//! Uses the 5 day / 3 hour forecast endpoint. Each 3-hour step is expanded
//! into hourly samples by interpolating toward the following step.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{Coordinate, ForecastWindow, RawProviderSeries, WeatherSample};

use super::units::{fahrenheit_to_celsius, mph_to_mps};
use super::{check_status, ProviderError, WeatherProvider};
use crate::config::OpenWeatherMapConfig;
use crate::error::{AppError, AppResult};

const SOURCE_ID: &str = "openweathermap";
const STEP_HOURS: i64 = 3;

/// OpenWeatherMap client
#[derive(Clone)]
pub struct OpenWeatherMapProvider {
    client: Client,
    api_key: String,
    config: OpenWeatherMapConfig,
    imperial: bool,
}

/// OpenWeatherMap API response for forecast
#[derive(Debug, Deserialize)]
pub(crate) struct OWMForecastResponse {
    list: Vec<OWMForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OWMForecastItem {
    dt: i64,
    main: OWMMain,
    wind: OWMWind,
    rain: Option<OWMPrecipitation>,
    snow: Option<OWMPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct OWMMain {
    temp: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OWMWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OWMPrecipitation {
    #[serde(rename = "3h")]
    three_hour: Option<f64>,
}

/// One forecast step already in engine units
#[derive(Debug, Clone, Copy)]
struct Step {
    timestamp: DateTime<Utc>,
    temperature_c: f64,
    humidity_pct: f64,
    wind_speed_mps: f64,
    pressure_hpa: f64,
    precipitation_3h_mm: f64,
}

impl OpenWeatherMapProvider {
    /// Create a new provider; `units` must be "metric" or "imperial"
    pub fn new(client: Client, api_key: String, config: OpenWeatherMapConfig) -> AppResult<Self> {
        let imperial = match config.units.as_str() {
            "metric" => false,
            "imperial" => true,
            other => {
                return Err(AppError::Configuration(format!(
                    "unsupported OpenWeatherMap units: {}",
                    other
                )))
            }
        };

        Ok(Self {
            client,
            api_key,
            config,
            imperial,
        })
    }

    fn to_step(&self, item: &OWMForecastItem) -> Result<Step, ProviderError> {
        let timestamp = DateTime::from_timestamp(item.dt, 0)
            .ok_or_else(|| ProviderError::Parse(format!("timestamp {}", item.dt)))?;

        let (temperature_c, wind_speed_mps) = if self.imperial {
            (fahrenheit_to_celsius(item.main.temp), mph_to_mps(item.wind.speed))
        } else {
            (item.main.temp, item.wind.speed)
        };

        // OWM reports precipitation in mm regardless of the units parameter
        let precipitation_3h_mm = item.rain.as_ref().and_then(|r| r.three_hour).unwrap_or(0.0)
            + item.snow.as_ref().and_then(|s| s.three_hour).unwrap_or(0.0);

        Ok(Step {
            timestamp,
            temperature_c,
            humidity_pct: item.main.humidity,
            wind_speed_mps,
            pressure_hpa: item.main.pressure,
            precipitation_3h_mm,
        })
    }

    /// Convert an OpenWeatherMap forecast response into the common schema
    pub(crate) fn convert_forecast_response(
        &self,
        data: OWMForecastResponse,
        window: &ForecastWindow,
    ) -> Result<RawProviderSeries, ProviderError> {
        let steps = data
            .list
            .iter()
            .map(|item| self.to_step(item))
            .collect::<Result<Vec<_>, _>>()?;

        let end = window.start + Duration::hours(window.hours as i64);
        let mut samples = Vec::with_capacity(steps.len() * STEP_HOURS as usize);

        for (i, step) in steps.iter().enumerate() {
            let next = steps.get(i + 1);
            for offset in 0..STEP_HOURS {
                let timestamp = step.timestamp + Duration::hours(offset);
                if timestamp < window.start || timestamp >= end {
                    continue;
                }
                // The final step has nothing to interpolate toward, so it is held
                let fraction = offset as f64 / STEP_HOURS as f64;
                let lerp = |from: f64, to: Option<f64>| match to {
                    Some(to) => from + (to - from) * fraction,
                    None => from,
                };
                samples.push(WeatherSample {
                    timestamp,
                    temperature_c: lerp(step.temperature_c, next.map(|n| n.temperature_c)),
                    humidity_pct: lerp(step.humidity_pct, next.map(|n| n.humidity_pct)),
                    wind_speed_mps: lerp(step.wind_speed_mps, next.map(|n| n.wind_speed_mps)),
                    pressure_hpa: lerp(step.pressure_hpa, next.map(|n| n.pressure_hpa)),
                    precipitation_mm: step.precipitation_3h_mm / STEP_HOURS as f64,
                });
            }
        }

        if samples.is_empty() {
            return Err(ProviderError::EmptyPayload);
        }

        Ok(RawProviderSeries {
            source: SOURCE_ID.to_string(),
            model_elevation_m: None,
            samples,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn reliability(&self) -> f64 {
        self.config.reliability
    }

    async fn fetch(
        &self,
        coordinate: &Coordinate,
        window: &ForecastWindow,
    ) -> Result<RawProviderSeries, ProviderError> {
        let url = format!(
            "{}/forecast?lat={}&lon={}&appid={}&units={}",
            self.config.base_url,
            coordinate.latitude,
            coordinate.longitude,
            self.api_key,
            self.config.units
        );

        let response = self.client.get(&url).send().await?;
        let data: OWMForecastResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        self.convert_forecast_response(data, window)
    }
}
