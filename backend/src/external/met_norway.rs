//! MET Norway Locationforecast 2.0 adapter

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use shared::{hour_bucket, Coordinate, ForecastWindow, RawProviderSeries, WeatherSample};

use super::{check_status, ProviderError, WeatherProvider};
use crate::config::MetNorwayConfig;

const SOURCE_ID: &str = "met-norway";

#[derive(Clone)]
pub struct MetNorwayProvider {
    client: Client,
    config: MetNorwayConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationForecast {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// [lon, lat, altitude]
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    timeseries: Vec<TimeStep>,
}

#[derive(Debug, Deserialize)]
struct TimeStep {
    time: DateTime<Utc>,
    data: StepData,
}

#[derive(Debug, Deserialize)]
struct StepData {
    instant: Instant,
    next_1_hours: Option<Period>,
    next_6_hours: Option<Period>,
}

#[derive(Debug, Deserialize)]
struct Instant {
    details: InstantDetails,
}

#[derive(Debug, Deserialize)]
struct InstantDetails {
    air_temperature: Option<f64>,
    relative_humidity: Option<f64>,
    wind_speed: Option<f64>,
    air_pressure_at_sea_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Period {
    details: Option<PeriodDetails>,
}

#[derive(Debug, Deserialize)]
struct PeriodDetails {
    precipitation_amount: Option<f64>,
}

impl Period {
    fn precipitation(&self) -> Option<f64> {
        self.details.as_ref().and_then(|d| d.precipitation_amount)
    }
}

impl MetNorwayProvider {
    pub fn new(client: Client, config: MetNorwayConfig) -> Self {
        Self { client, config }
    }

    pub(crate) fn convert_response(
        data: LocationForecast,
        window: &ForecastWindow,
    ) -> Result<RawProviderSeries, ProviderError> {
        let end = window.start + Duration::hours(window.hours as i64);
        let mut samples = Vec::with_capacity(data.properties.timeseries.len());

        for step in &data.properties.timeseries {
            let details = &step.data.instant.details;
            let (Some(temperature_c), Some(humidity_pct), Some(wind_speed_mps), Some(pressure_hpa)) = (
                details.air_temperature,
                details.relative_humidity,
                details.wind_speed,
                details.air_pressure_at_sea_level,
            ) else {
                continue;
            };

            // Hourly resolution near term, 6-hourly further out. Coarse steps
            // are spread evenly over the hours they cover.
            let (hours, precipitation_mm) =
                match (&step.data.next_1_hours, &step.data.next_6_hours) {
                    (Some(one), _) => (1, one.precipitation().unwrap_or(0.0)),
                    (None, Some(six)) => (6, six.precipitation().unwrap_or(0.0) / 6.0),
                    (None, None) => (1, 0.0),
                };

            let start = hour_bucket(step.time);
            for offset in 0..hours {
                let timestamp = start + Duration::hours(offset);
                if timestamp < window.start || timestamp >= end {
                    continue;
                }
                samples.push(WeatherSample {
                    timestamp,
                    temperature_c,
                    humidity_pct,
                    wind_speed_mps,
                    pressure_hpa,
                    precipitation_mm,
                });
            }
        }

        if samples.is_empty() {
            return Err(ProviderError::EmptyPayload);
        }

        Ok(RawProviderSeries {
            source: SOURCE_ID.to_string(),
            model_elevation_m: data.geometry.coordinates.get(2).copied(),
            samples,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl WeatherProvider for MetNorwayProvider {
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
        // The API asks for at most four decimals so responses stay cacheable upstream
        let url = format!(
            "{}/compact?lat={:.4}&lon={:.4}",
            self.config.base_url, coordinate.latitude, coordinate.longitude
        );

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .await?;
        let data: LocationForecast = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Self::convert_response(data, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(hours: u32) -> ForecastWindow {
        ForecastWindow {
            start: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            hours,
        }
    }

    fn fixture() -> LocationForecast {
        serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [10.75, 59.91, 23.0]},
            "properties": {
                "timeseries": [
                    {
                        "time": "2024-06-01T00:00:00Z",
                        "data": {
                            "instant": {"details": {
                                "air_temperature": 14.2,
                                "relative_humidity": 81.0,
                                "wind_speed": 2.4,
                                "air_pressure_at_sea_level": 1008.1
                            }},
                            "next_1_hours": {"details": {"precipitation_amount": 0.3}}
                        }
                    },
                    {
                        "time": "2024-06-01T01:00:00Z",
                        "data": {
                            "instant": {"details": {
                                "air_temperature": 13.9,
                                "relative_humidity": 83.0,
                                "wind_speed": 2.1,
                                "air_pressure_at_sea_level": 1007.9
                            }},
                            "next_6_hours": {"details": {"precipitation_amount": 3.0}}
                        }
                    }
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_convert_reports_altitude_and_expands_six_hour_steps() {
        let series = MetNorwayProvider::convert_response(fixture(), &window(48)).unwrap();
        assert_eq!(series.source, "met-norway");
        assert_eq!(series.model_elevation_m, Some(23.0));
        assert_eq!(series.samples.len(), 7);
        assert!((series.samples[0].precipitation_mm - 0.3).abs() < 1e-9);
        assert!((series.samples[3].precipitation_mm - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_convert_clips_to_window() {
        let series = MetNorwayProvider::convert_response(fixture(), &window(3)).unwrap();
        assert_eq!(series.samples.len(), 3);
        assert!(series.samples.iter().all(|s| s.timestamp < window(3).start + Duration::hours(3)));
    }
}
