//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agrocast_backend::config::Config;
use agrocast_backend::external::{ProviderError, WeatherProvider};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use shared::{
    hour_bucket, ConsensusForecast, ConsensusSeries, Coordinate, ForecastMetadata,
    ForecastWindow, RawProviderSeries, WeatherSample,
};
use uuid::Uuid;

/// How a mock provider responds
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Respond,
    Fail,
    Panic,
    /// Return only this many samples
    Partial(usize),
    Implausible,
}

/// Scriptable provider that counts its calls
pub struct MockProvider {
    pub id: String,
    pub temperature_c: f64,
    pub delay: Duration,
    pub behavior: Behavior,
    pub model_elevation_m: Option<f64>,
    pub calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(id: &str, temperature_c: f64) -> Self {
        Self {
            id: id.to_string(),
            temperature_c,
            delay: Duration::ZERO,
            behavior: Behavior::Respond,
            model_elevation_m: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn at_elevation(mut self, elevation_m: f64) -> Self {
        self.model_elevation_m = Some(elevation_m);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn into_arc(self) -> Arc<dyn WeatherProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl WeatherProvider for MockProvider {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch(
        &self,
        _coordinate: &Coordinate,
        window: &ForecastWindow,
    ) -> Result<RawProviderSeries, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let count = match self.behavior {
            Behavior::Fail => return Err(ProviderError::Parse("scripted failure".into())),
            Behavior::Panic => panic!("scripted provider panic"),
            Behavior::Partial(n) => n,
            Behavior::Respond | Behavior::Implausible => window.hours as usize,
        };

        let mut samples = hourly_samples(window.start, count, self.temperature_c);
        if let Behavior::Implausible = self.behavior {
            samples[3].humidity_pct = 140.0;
        }

        Ok(RawProviderSeries {
            source: self.id.clone(),
            model_elevation_m: self.model_elevation_m,
            samples,
            fetched_at: Utc::now(),
        })
    }
}

/// `count` calm hourly samples from `start`
pub fn hourly_samples(
    start: chrono::DateTime<Utc>,
    count: usize,
    temperature_c: f64,
) -> Vec<WeatherSample> {
    (0..count as i64)
        .map(|h| WeatherSample {
            timestamp: start + ChronoDuration::hours(h),
            temperature_c,
            humidity_pct: 65.0,
            wind_speed_mps: 3.0,
            pressure_hpa: 1013.0,
            precipitation_mm: 0.0,
        })
        .collect()
}

/// Config with short timeouts suitable for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.environment = "test".to_string();
    config.providers.per_provider_timeout_ms = 200;
    config.providers.overall_deadline_ms = 500;
    config.providers.horizon_days = 3;
    config
}

/// A forecast assembled from `samples` issued now, with the given confidence
pub fn forecast_from(samples: Vec<WeatherSample>, confidence: f64) -> ConsensusForecast {
    let issued_at = samples.first().map(|s| s.timestamp).unwrap_or_else(Utc::now);
    let metadata = ForecastMetadata {
        forecast_id: Uuid::new_v4(),
        issued_at,
        sources: vec!["mock".to_string()],
        failed_sources: Vec::new(),
        confidence,
        adjustments: Vec::new(),
    };
    let series = ConsensusSeries {
        samples,
        reference_elevation_m: None,
    };
    ConsensusForecast::assemble("field-1", Coordinate::new(41.59, -93.62, None), &series, metadata)
        .expect("series has current hours")
}

/// Calm samples from the current hour
pub fn calm_from_now(hours: usize) -> Vec<WeatherSample> {
    hourly_samples(hour_bucket(Utc::now()), hours, 15.0)
}
