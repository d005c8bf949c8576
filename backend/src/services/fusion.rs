//! Ensemble fusion of provider series into one consensus series

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{hour_bucket, ConsensusSeries, RawProviderSeries, WeatherSample};

use crate::external::WeatherProvider;

/// Upper bound on reported confidence
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Spread at which a metric counts as one unit of disagreement:
/// temperature °C, humidity %, wind m/s, pressure hPa, precipitation mm
const REFERENCE_SPREAD: [f64; 5] = [2.0, 10.0, 2.0, 3.0, 2.0];

/// Fused series and its confidence score
#[derive(Debug, Clone)]
pub struct FusionResult {
    pub series: ConsensusSeries,
    pub confidence: f64,
}

/// Reliability-weighted fusion across sources
#[derive(Debug, Clone)]
pub struct EnsembleFusion {
    weights: HashMap<String, f64>,
    configured_sources: usize,
}

fn metrics(sample: &WeatherSample) -> [f64; 5] {
    [
        sample.temperature_c,
        sample.humidity_pct,
        sample.wind_speed_mps,
        sample.pressure_hpa,
        sample.precipitation_mm,
    ]
}

impl EnsembleFusion {
    /// Fusion with uniform weights over `configured_sources` providers
    pub fn new(configured_sources: usize) -> Self {
        Self {
            weights: HashMap::new(),
            configured_sources,
        }
    }

    pub fn with_weight(mut self, source: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(source.into(), weight);
        self
    }

    pub fn from_providers(providers: &[Arc<dyn WeatherProvider>]) -> Self {
        providers.iter().fold(Self::new(providers.len()), |fusion, p| {
            fusion.with_weight(p.source_id(), p.reliability())
        })
    }

    fn weight(&self, source: &str) -> f64 {
        match self.weights.get(source) {
            Some(w) if w.is_finite() && *w > 0.0 => *w,
            _ => 1.0,
        }
    }

    /// Fuse provider series into hourly consensus values.
    ///
    /// Confidence is `MAX_CONFIDENCE × coverage × 1 / (1 + D)` where D is
    /// the mean normalized weighted spread over buckets with at least two
    /// sources.
    pub fn fuse(&self, series: &[RawProviderSeries]) -> FusionResult {
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<(f64, WeatherSample)>> = BTreeMap::new();
        let mut responding: HashSet<&str> = HashSet::new();

        for provider_series in series {
            let weight = self.weight(&provider_series.source);
            let mut seen = HashSet::new();
            for sample in &provider_series.samples {
                let bucket = hour_bucket(sample.timestamp);
                // First sample in a bucket wins
                if seen.insert(bucket) {
                    buckets.entry(bucket).or_default().push((weight, *sample));
                }
            }
            if !seen.is_empty() {
                responding.insert(provider_series.source.as_str());
            }
        }

        let mut samples = Vec::with_capacity(buckets.len());
        let mut dispersion_sum = 0.0;
        let mut dispersion_terms = 0usize;

        for (bucket, members) in &buckets {
            let total_weight: f64 = members.iter().map(|(w, _)| w).sum();
            let mut mean = [0.0; 5];
            for (w, sample) in members {
                for (m, v) in mean.iter_mut().zip(metrics(sample)) {
                    *m += w * v;
                }
            }
            for m in mean.iter_mut() {
                *m /= total_weight;
            }

            if members.len() >= 2 {
                for k in 0..5 {
                    let variance = members
                        .iter()
                        .map(|(w, s)| w * (metrics(s)[k] - mean[k]).powi(2))
                        .sum::<f64>()
                        / total_weight;
                    dispersion_sum += variance.sqrt() / REFERENCE_SPREAD[k];
                    dispersion_terms += 1;
                }
            }

            samples.push(WeatherSample {
                timestamp: *bucket,
                temperature_c: mean[0],
                humidity_pct: mean[1],
                wind_speed_mps: mean[2],
                pressure_hpa: mean[3],
                precipitation_mm: mean[4],
            });
        }

        let dispersion = if dispersion_terms == 0 {
            0.0
        } else {
            dispersion_sum / dispersion_terms as f64
        };
        let coverage = if self.configured_sources == 0 {
            0.0
        } else {
            (responding.len() as f64 / self.configured_sources as f64).min(1.0)
        };
        let confidence = (MAX_CONFIDENCE * coverage / (1.0 + dispersion)).clamp(0.0, MAX_CONFIDENCE);

        let (elevation_sum, elevation_weight) = series
            .iter()
            .filter_map(|s| s.model_elevation_m.map(|e| (self.weight(&s.source), e)))
            .fold((0.0, 0.0), |(sum, wsum), (w, e)| (sum + w * e, wsum + w));
        let reference_elevation_m = (elevation_weight > 0.0).then(|| elevation_sum / elevation_weight);

        FusionResult {
            series: ConsensusSeries {
                samples,
                reference_elevation_m,
            },
            confidence,
        }
    }
}
