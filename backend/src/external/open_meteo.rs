//! Open-Meteo forecast adapter
//!
//! Free, keyless hourly forecasts. Response units are read from
//! `hourly_units`, so any unit combination the endpoint returns is
//! normalized here.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{Coordinate, ForecastWindow, RawProviderSeries, WeatherSample};

use super::units::{fahrenheit_to_celsius, inches_to_mm, kmh_to_mps, knots_to_mps, mph_to_mps};
use super::{check_status, ProviderError, WeatherProvider};
use crate::config::OpenMeteoConfig;

const SOURCE_ID: &str = "open-meteo";
const HOURLY_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,surface_pressure,precipitation";

/// Open-Meteo client
#[derive(Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    config: OpenMeteoConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenMeteoResponse {
    elevation: Option<f64>,
    hourly_units: OpenMeteoUnits,
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoUnits {
    temperature_2m: String,
    wind_speed_10m: String,
    precipitation: String,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    surface_pressure: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
}

impl OpenMeteoProvider {
    pub fn new(client: Client, config: OpenMeteoConfig) -> Self {
        Self { client, config }
    }

    /// Convert an Open-Meteo response into the common schema
    pub(crate) fn convert_response(
        data: OpenMeteoResponse,
        window: &ForecastWindow,
    ) -> Result<RawProviderSeries, ProviderError> {
        let to_celsius = temperature_converter(&data.hourly_units.temperature_2m)?;
        let to_mps = wind_converter(&data.hourly_units.wind_speed_10m)?;
        let to_mm = precipitation_converter(&data.hourly_units.precipitation)?;

        let hourly = &data.hourly;
        let end = window.start + Duration::hours(window.hours as i64);
        let mut samples = Vec::with_capacity(hourly.time.len());

        for (i, time) in hourly.time.iter().enumerate() {
            let timestamp = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
                .map_err(|e| ProviderError::Parse(format!("time {:?}: {}", time, e)))?
                .and_utc();
            if timestamp < window.start || timestamp >= end {
                continue;
            }

            let values = (
                at(&hourly.temperature_2m, i),
                at(&hourly.relative_humidity_2m, i),
                at(&hourly.wind_speed_10m, i),
                at(&hourly.surface_pressure, i),
                at(&hourly.precipitation, i),
            );
            // Hours with any missing metric are dropped rather than imputed
            if let (Some(t), Some(h), Some(w), Some(p), Some(r)) = values {
                samples.push(WeatherSample {
                    timestamp,
                    temperature_c: to_celsius(t),
                    humidity_pct: h,
                    wind_speed_mps: to_mps(w),
                    pressure_hpa: p,
                    precipitation_mm: to_mm(r),
                });
            }
        }

        if samples.is_empty() {
            return Err(ProviderError::EmptyPayload);
        }

        Ok(RawProviderSeries {
            source: SOURCE_ID.to_string(),
            model_elevation_m: data.elevation,
            samples,
            fetched_at: Utc::now(),
        })
    }
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn temperature_converter(unit: &str) -> Result<fn(f64) -> f64, ProviderError> {
    match unit {
        "°C" => Ok(|v| v),
        "°F" => Ok(fahrenheit_to_celsius),
        other => Err(ProviderError::Parse(format!("temperature unit {:?}", other))),
    }
}

fn wind_converter(unit: &str) -> Result<fn(f64) -> f64, ProviderError> {
    match unit {
        "m/s" => Ok(|v| v),
        "km/h" => Ok(kmh_to_mps),
        "mp/h" | "mph" => Ok(mph_to_mps),
        "kn" => Ok(knots_to_mps),
        other => Err(ProviderError::Parse(format!("wind unit {:?}", other))),
    }
}

fn precipitation_converter(unit: &str) -> Result<fn(f64) -> f64, ProviderError> {
    match unit {
        "mm" => Ok(|v| v),
        "inch" => Ok(inches_to_mm),
        other => Err(ProviderError::Parse(format!("precipitation unit {:?}", other))),
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
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
            "{}/forecast?latitude={:.4}&longitude={:.4}&hourly={}&forecast_days={}&timezone=UTC",
            self.config.base_url,
            coordinate.latitude,
            coordinate.longitude,
            HOURLY_FIELDS,
            window.days() + 1,
        );

        let response = self.client.get(&url).send().await?;
        let data: OpenMeteoResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Self::convert_response(data, window)
    }
}
