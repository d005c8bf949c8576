//! Hazard detection over the near-term forecast

use chrono::Duration;
use shared::{
    AlertSeverity, AlertType, ConsensusForecast, FarmingImpact, WeatherAlert, WeatherSample,
};

use crate::config::AlertThresholds;

/// Farming recommendations per alert type and severity
fn recommendations(alert_type: AlertType, severity: AlertSeverity) -> &'static [&'static str] {
    use AlertSeverity::*;
    use AlertType::*;

    match (alert_type, severity) {
        (Frost, Warning) => &[
            "Cover or irrigate frost-sensitive crops before sunset",
            "Delay transplanting and fertilizer application",
            "Harvest mature produce at risk before temperatures drop",
        ],
        (Frost, _) => &[
            "Monitor overnight temperatures in low-lying parts of the field",
            "Prepare frost protection for sensitive crops",
        ],
        (HeavyPrecipitation, Warning) => &[
            "Clear drainage channels and avoid field traffic on saturated soil",
            "Postpone fertilizer and pesticide applications to prevent runoff",
            "Check for waterlogging and erosion after the event",
        ],
        (HeavyPrecipitation, _) => &[
            "Postpone fertilizer application until after the rain",
            "Suspend irrigation",
        ],
        (HighWind, Warning) => &[
            "Secure equipment, covers and temporary structures",
            "Do not spray; drift risk is severe",
            "Inspect for lodging once winds ease",
        ],
        (HighWind, _) => &["Avoid spraying during peak wind hours"],
        (Storm, Warning) => &[
            "Secure equipment and livestock shelters",
            "Postpone field operations until the storm passes",
            "Inspect crops for hail and wind damage afterwards",
        ],
        (Storm, _) => &[
            "Plan field work around the approaching system",
            "Avoid spraying ahead of the pressure drop",
        ],
    }
}

/// Evaluates threshold rules over `current` plus the hourly series
#[derive(Debug, Clone)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, forecast: &ConsensusForecast) -> Vec<WeatherAlert> {
        self.evaluate_samples(&forecast.evaluation_window())
    }

    /// Alerts for an ascending hourly series, ordered frost, heavy
    /// precipitation, high wind, storm
    pub fn evaluate_samples(&self, samples: &[WeatherSample]) -> Vec<WeatherAlert> {
        if samples.is_empty() {
            return Vec::new();
        }

        [
            self.frost(samples),
            self.heavy_precipitation(samples),
            self.high_wind(samples),
            self.storm(samples),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn frost(&self, samples: &[WeatherSample]) -> Option<WeatherAlert> {
        let min_temp = samples.iter().map(|s| s.temperature_c).fold(f64::INFINITY, f64::min);
        let severity = if min_temp <= self.thresholds.frost_warning_c {
            AlertSeverity::Warning
        } else if min_temp <= self.thresholds.frost_watch_c {
            AlertSeverity::Watch
        } else {
            return None;
        };
        Some(alert(
            AlertType::Frost,
            severity,
            format!("Minimum temperature of {:.1} °C expected", min_temp),
            min_temp,
        ))
    }

    fn heavy_precipitation(&self, samples: &[WeatherSample]) -> Option<WeatherAlert> {
        let max_24h = max_rolling_sum(samples, Duration::hours(24));
        let severity = if max_24h > self.thresholds.heavy_precip_warning_mm {
            AlertSeverity::Warning
        } else if max_24h > self.thresholds.heavy_precip_watch_mm {
            AlertSeverity::Watch
        } else {
            return None;
        };
        Some(alert(
            AlertType::HeavyPrecipitation,
            severity,
            format!("Up to {:.1} mm of precipitation within 24 hours", max_24h),
            max_24h,
        ))
    }

    fn high_wind(&self, samples: &[WeatherSample]) -> Option<WeatherAlert> {
        let max_wind = samples.iter().map(|s| s.wind_speed_mps).fold(0.0, f64::max);
        let severity = if max_wind > self.thresholds.high_wind_warning_mps {
            AlertSeverity::Warning
        } else if max_wind > self.thresholds.high_wind_advisory_mps {
            AlertSeverity::Advisory
        } else {
            return None;
        };
        Some(alert(
            AlertType::HighWind,
            severity,
            format!("Sustained winds up to {:.1} m/s", max_wind),
            max_wind,
        ))
    }

    /// Largest pressure fall within any 3-hour span
    fn storm(&self, samples: &[WeatherSample]) -> Option<WeatherAlert> {
        let span = Duration::hours(3);
        let mut worst: Option<(AlertSeverity, f64)> = None;

        for (i, start) in samples.iter().enumerate() {
            let mut span_wind = start.wind_speed_mps;
            for later in samples[i + 1..]
                .iter()
                .take_while(|s| s.timestamp - start.timestamp <= span)
            {
                span_wind = span_wind.max(later.wind_speed_mps);
                let drop = start.pressure_hpa - later.pressure_hpa;
                if drop < self.thresholds.storm_pressure_drop_hpa {
                    continue;
                }
                let severity = if drop >= self.thresholds.storm_pressure_drop_warning_hpa
                    || span_wind > self.thresholds.high_wind_advisory_mps
                {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Watch
                };
                worst = match worst {
                    Some((s, d)) => Some((s.max(severity), d.max(drop))),
                    None => Some((severity, drop)),
                };
            }
        }

        worst.map(|(severity, drop)| {
            alert(
                AlertType::Storm,
                severity,
                format!("Pressure falling {:.1} hPa within 3 hours", drop),
                drop,
            )
        })
    }
}

fn alert(
    alert_type: AlertType,
    severity: AlertSeverity,
    description: String,
    trigger_value: f64,
) -> WeatherAlert {
    WeatherAlert {
        alert_type,
        severity,
        description,
        trigger_value,
        farming_impact: FarmingImpact {
            recommendations: recommendations(alert_type, severity)
                .iter()
                .map(|r| r.to_string())
                .collect(),
        },
    }
}

/// Maximum precipitation accumulated over `[t, t + window)` for any sample
/// timestamp `t`. Samples must be ascending.
fn max_rolling_sum(samples: &[WeatherSample], window: Duration) -> f64 {
    let mut max = 0.0_f64;
    let mut sum = 0.0;
    let mut end = 0;
    for (start, anchor) in samples.iter().enumerate() {
        while end < samples.len() && samples[end].timestamp - anchor.timestamp < window {
            sum += samples[end].precipitation_mm;
            end += 1;
        }
        max = max.max(sum);
        if end > start {
            sum -= anchor.precipitation_mm;
        } else {
            end = start + 1;
        }
    }
    max
}
