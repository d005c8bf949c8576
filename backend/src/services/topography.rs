//! Local topographic corrections applied to the consensus series

use std::collections::HashMap;

use chrono::NaiveDate;
use shared::{lapse_rate_adjustment, Adjustment, AdjustmentFactor, ConsensusSeries, FieldContext};

use crate::config::TopographyConfig;

/// Applies elevation, water proximity and urban heat island corrections,
/// in that order
#[derive(Debug, Clone)]
pub struct TopographicAdjuster {
    config: TopographyConfig,
}

impl TopographicAdjuster {
    pub fn new(config: TopographyConfig) -> Self {
        Self { config }
    }

    /// Adjust a series for the field. One `Adjustment` is recorded per
    /// triggered rule, in order of application.
    pub fn adjust(
        &self,
        mut series: ConsensusSeries,
        context: &FieldContext,
    ) -> (ConsensusSeries, Vec<Adjustment>) {
        let mut adjustments = Vec::new();

        if let Some(field_elevation) = context.coordinate.elevation_m {
            let reference = series
                .reference_elevation_m
                .unwrap_or(self.config.reference_elevation_m);
            let delta = lapse_rate_adjustment(field_elevation, reference);
            for sample in series.samples.iter_mut() {
                sample.temperature_c += delta;
            }
            adjustments.push(Adjustment {
                factor: AdjustmentFactor::Elevation,
                magnitude: delta,
                description: format!(
                    "Lapse-rate correction for field at {:.0} m against model elevation {:.0} m",
                    field_elevation, reference
                ),
            });
        }

        if context.near_water {
            let damping = self.config.water_diurnal_reduction_pct / 100.0;
            let humidity_factor = 1.0 + self.config.water_humidity_increase_pct / 100.0;

            let mut daily: HashMap<NaiveDate, (f64, usize)> = HashMap::new();
            for sample in &series.samples {
                let entry = daily.entry(sample.timestamp.date_naive()).or_insert((0.0, 0));
                entry.0 += sample.temperature_c;
                entry.1 += 1;
            }

            for sample in series.samples.iter_mut() {
                if let Some((sum, count)) = daily.get(&sample.timestamp.date_naive()) {
                    let mean = sum / *count as f64;
                    sample.temperature_c = mean + (sample.temperature_c - mean) * (1.0 - damping);
                }
                sample.humidity_pct = (sample.humidity_pct * humidity_factor).min(100.0);
            }

            adjustments.push(Adjustment {
                factor: AdjustmentFactor::WaterProximity,
                magnitude: -self.config.water_diurnal_reduction_pct,
                description: format!(
                    "Diurnal range reduced {}% and humidity raised {}% near open water",
                    self.config.water_diurnal_reduction_pct, self.config.water_humidity_increase_pct
                ),
            });
        }

        if let Some(density) = context
            .urban_density
            .filter(|d| *d > self.config.urban_density_threshold)
        {
            let offset = self.config.urban_max_warming_c * density;
            for sample in series.samples.iter_mut() {
                sample.temperature_c += offset;
            }
            adjustments.push(Adjustment {
                factor: AdjustmentFactor::UrbanHeatIsland,
                magnitude: offset,
                description: format!("Urban heat island warming at density {:.2}", density),
            });
        }

        (series, adjustments)
    }
}
