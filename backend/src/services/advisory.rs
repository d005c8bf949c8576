//! Crop and growth-stage aware advisories
//!
//! Rules are static data: an exhaustive match over `(CropType, GrowthStage)`
//! selects the crop-specific rules, and stage-common rules follow. Each rule
//! pairs a typed condition over a precomputed [`ForecastOutlook`] with one
//! piece of guidance.

use shared::{
    growing_degree_days, AlertSeverity, AlertType, ConsensusForecast, CropAdvisory, CropType,
    GrowthStage, WaterDemand, WeatherAlert, WeatherSample,
};

/// Rain amount above which irrigation should wait for the rain (mm over 7 days)
pub const IRRIGATION_DELAY_RAIN_MM: f64 = 10.0;

/// Typed predicate over the forecast outlook
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Always,
    /// An alert of this type at or above this severity is active
    AlertAtLeast(AlertType, AlertSeverity),
    /// Lowest daily minimum over the outlook (°C)
    MinTempBelow(f64),
    /// Highest daily maximum over the outlook (°C)
    MaxTempAbove(f64),
    Rain48hAbove(f64),
    Rain7dAbove(f64),
    Rain7dBelow(f64),
    Rain7dAtMost(f64),
    /// Mean relative humidity over the next 48 hours (%)
    HumidityAbove(f64),
    WindAbove(f64),
    /// Longest rain-free run in the next 48 hours is at least this many hours
    DryWindowAtLeast(u32),
    /// Forecast GDD over the daily outlook at `base` exceeds `value`
    GddAbove { base: f64, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Recommend(&'static str),
    Risk(&'static str),
    Opportunity(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisoryRule {
    pub condition: Condition,
    pub outcome: Outcome,
}

const fn rule(condition: Condition, outcome: Outcome) -> AdvisoryRule {
    AdvisoryRule { condition, outcome }
}

/// Rain below this within an hour counts as dry (mm)
const DRY_HOUR_MM: f64 = 0.1;

/// Aggregates the rule conditions are evaluated against
#[derive(Debug, Clone)]
pub struct ForecastOutlook<'a> {
    pub alerts: &'a [WeatherAlert],
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    pub rain_48h_mm: f64,
    pub rain_7d_mm: f64,
    pub mean_humidity_48h_pct: f64,
    pub max_wind_48h_mps: f64,
    pub longest_dry_window_h: u32,
    daily_extremes: Vec<(f64, f64)>,
}

impl<'a> ForecastOutlook<'a> {
    pub fn new(forecast: &ConsensusForecast, alerts: &'a [WeatherAlert]) -> Self {
        let near_term = forecast.evaluation_window();

        let daily_extremes: Vec<(f64, f64)> = forecast
            .daily
            .iter()
            .map(|d| (d.temp_min_c, d.temp_max_c))
            .collect();
        let near_min = near_term.iter().map(|s| s.temperature_c).fold(f64::INFINITY, f64::min);
        let near_max = near_term.iter().map(|s| s.temperature_c).fold(f64::NEG_INFINITY, f64::max);

        let rain_7d_mm = if forecast.daily.is_empty() {
            near_term.iter().map(|s| s.precipitation_mm).sum()
        } else {
            forecast.daily.iter().map(|d| d.precipitation_mm).sum()
        };

        Self {
            alerts,
            min_temp_c: daily_extremes.iter().map(|(min, _)| *min).fold(near_min, f64::min),
            max_temp_c: daily_extremes.iter().map(|(_, max)| *max).fold(near_max, f64::max),
            rain_48h_mm: near_term.iter().map(|s| s.precipitation_mm).sum(),
            rain_7d_mm,
            mean_humidity_48h_pct: mean(near_term.iter().map(|s| s.humidity_pct)),
            max_wind_48h_mps: near_term.iter().map(|s| s.wind_speed_mps).fold(0.0, f64::max),
            longest_dry_window_h: longest_dry_run(&near_term),
            daily_extremes,
        }
    }

    /// Accumulated GDD over the daily outlook
    pub fn forecast_gdd(&self, base_c: f64) -> f64 {
        self.daily_extremes
            .iter()
            .map(|(min, max)| growing_degree_days(*max, *min, base_c))
            .sum()
    }

    pub fn matches(&self, condition: &Condition) -> bool {
        match *condition {
            Condition::Always => true,
            Condition::AlertAtLeast(alert_type, severity) => {
                self.alerts.iter().any(|a| a.is_at_least(alert_type, severity))
            }
            Condition::MinTempBelow(t) => self.min_temp_c < t,
            Condition::MaxTempAbove(t) => self.max_temp_c > t,
            Condition::Rain48hAbove(mm) => self.rain_48h_mm > mm,
            Condition::Rain7dAbove(mm) => self.rain_7d_mm > mm,
            Condition::Rain7dBelow(mm) => self.rain_7d_mm < mm,
            Condition::Rain7dAtMost(mm) => self.rain_7d_mm <= mm,
            Condition::HumidityAbove(pct) => self.mean_humidity_48h_pct > pct,
            Condition::WindAbove(mps) => self.max_wind_48h_mps > mps,
            Condition::DryWindowAtLeast(hours) => self.longest_dry_window_h >= hours,
            Condition::GddAbove { base, value } => self.forecast_gdd(base) > value,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn longest_dry_run(samples: &[WeatherSample]) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    for sample in samples {
        if sample.precipitation_mm < DRY_HOUR_MM {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

use Condition::*;
use Outcome::*;

// ============================================================================
// Corn
// ============================================================================

const CORN_GERMINATION: &[AdvisoryRule] = &[
    rule(MinTempBelow(10.0), Risk("Soil below 10 °C slows corn germination and favors seed rot")),
    rule(Rain48hAbove(25.0), Risk("Heavy rain may crust the soil and hinder corn emergence")),
    rule(GddAbove { base: 10.0, value: 60.0 }, Opportunity("Warm week ahead supports rapid, even corn germination")),
];

const CORN_EMERGENCE: &[AdvisoryRule] = &[
    rule(AlertAtLeast(AlertType::Frost, AlertSeverity::Watch), Risk("Frost can damage exposed corn leaves; growing point stays protected until V5")),
    rule(DryWindowAtLeast(24), Recommend("Use the dry window for pre-emergence weed control")),
];

const CORN_VEGETATIVE: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(12), Recommend("Side-dress nitrogen during the dry window before the next rain")),
    rule(WindAbove(15.0), Risk("Strong winds raise corn lodging risk")),
    rule(GddAbove { base: 10.0, value: 80.0 }, Opportunity("High heat accumulation will speed corn canopy development")),
];

const CORN_FLOWERING: &[AdvisoryRule] = &[
    rule(MaxTempAbove(35.0), Risk("Heat above 35 °C during silking reduces pollen viability and kernel set")),
    rule(Rain7dBelow(15.0), Recommend("Prioritize irrigation; corn water use peaks at silking")),
    rule(HumidityAbove(85.0), Risk("Humid conditions favor gray leaf spot; scout lower canopy")),
];

const CORN_MATURITY: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(36), Opportunity("Extended dry spell favors field drydown before harvest")),
    rule(Rain7dAbove(30.0), Risk("Wet weather delays harvest and raises ear rot risk")),
];

// ============================================================================
// Soybean
// ============================================================================

const SOYBEAN_GERMINATION: &[AdvisoryRule] = &[
    rule(MinTempBelow(10.0), Risk("Cold soil delays soybean germination and invites seedling disease")),
    rule(Rain48hAbove(20.0), Risk("Saturated soil after planting can cause imbibitional chilling injury")),
];

const SOYBEAN_EMERGENCE: &[AdvisoryRule] = &[
    rule(AlertAtLeast(AlertType::Frost, AlertSeverity::Watch), Risk("Emerged soybeans are killed by frost once the growing point is above ground")),
    rule(Rain48hAbove(15.0), Risk("Crusting after heavy rain can block soybean hypocotyls")),
];

const SOYBEAN_VEGETATIVE: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(12), Recommend("Apply post-emergence herbicide during the dry window")),
    rule(HumidityAbove(85.0), Risk("Persistent humidity raises soybean foliar disease pressure")),
];

const SOYBEAN_FLOWERING: &[AdvisoryRule] = &[
    rule(MaxTempAbove(32.0), Risk("Heat stress during flowering causes soybean flower abortion")),
    rule(HumidityAbove(80.0), Risk("White mold risk rises with humid canopy conditions at flowering")),
];

const SOYBEAN_FRUITING: &[AdvisoryRule] = &[
    rule(Rain7dBelow(20.0), Recommend("Irrigate during pod fill; drought now reduces seed size")),
    rule(MaxTempAbove(33.0), Risk("High temperatures during pod fill shorten the seed-fill period")),
    rule(Rain7dAbove(25.0), Opportunity("Expected rainfall supports pod fill and seed weight")),
];

const SOYBEAN_MATURITY: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(36), Opportunity("Dry conditions allow timely soybean harvest at proper moisture")),
    rule(Rain7dAbove(25.0), Risk("Repeated wetting and drying causes pod shatter and seed quality loss")),
];

// ============================================================================
// Wheat
// ============================================================================

const WHEAT_GERMINATION: &[AdvisoryRule] = &[
    rule(Rain7dBelow(5.0), Risk("Dry seedbed may give uneven wheat stands")),
    rule(MaxTempAbove(30.0), Risk("Warm soils delay wheat germination")),
];

const WHEAT_EMERGENCE: &[AdvisoryRule] = &[
    rule(AlertAtLeast(AlertType::HeavyPrecipitation, AlertSeverity::Watch), Risk("Waterlogging can thin emerging wheat stands")),
    rule(MinTempBelow(-5.0), Risk("Hard frost before tillering can heave young wheat")),
];

const WHEAT_VEGETATIVE: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(12), Recommend("Top-dress nitrogen ahead of the next rain")),
    rule(HumidityAbove(85.0), Risk("Humid weather favors rust and septoria in wheat")),
];

const WHEAT_FLOWERING: &[AdvisoryRule] = &[
    rule(Rain48hAbove(5.0), Risk("Rain at anthesis raises fusarium head blight risk; consider fungicide")),
    rule(MaxTempAbove(30.0), Risk("Heat at anthesis causes wheat floret sterility")),
    rule(AlertAtLeast(AlertType::Frost, AlertSeverity::Watch), Risk("Frost at heading can blank wheat ears")),
];

const WHEAT_MATURITY: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(36), Opportunity("Dry window suits wheat harvest at low grain moisture")),
    rule(Rain7dAbove(20.0), Risk("Rain on ripe wheat risks pre-harvest sprouting and low falling number")),
];

// ============================================================================
// Rice
// ============================================================================

const RICE_GERMINATION: &[AdvisoryRule] = &[
    rule(MinTempBelow(12.0), Risk("Cool water temperatures slow rice germination")),
    rule(GddAbove { base: 10.0, value: 70.0 }, Opportunity("Warm conditions favor uniform rice establishment")),
];

const RICE_EMERGENCE: &[AdvisoryRule] = &[
    rule(WindAbove(10.0), Risk("Wind-driven water movement can uproot emerging rice seedlings")),
    rule(Rain48hAbove(40.0), Risk("Deep flooding after heavy rain may submerge young rice")),
];

const RICE_VEGETATIVE: &[AdvisoryRule] = &[
    rule(Rain7dBelow(20.0), Recommend("Maintain flood depth; little rain expected to replenish paddies")),
    rule(HumidityAbove(90.0), Risk("High humidity favors rice blast; scout for leaf lesions")),
];

const RICE_FLOWERING: &[AdvisoryRule] = &[
    rule(MaxTempAbove(35.0), Risk("Temperatures above 35 °C at anthesis cause rice spikelet sterility")),
    rule(MinTempBelow(15.0), Risk("Cold nights during flowering reduce rice pollen fertility")),
    rule(WindAbove(10.0), Risk("Strong wind at flowering can damage rice panicles")),
];

const RICE_MATURITY: &[AdvisoryRule] = &[
    rule(DryWindowAtLeast(24), Recommend("Drain paddies ahead of harvest during the dry spell")),
    rule(AlertAtLeast(AlertType::HighWind, AlertSeverity::Advisory), Risk("Heavy rice panicles are prone to lodging in strong wind")),
];

// ============================================================================
// Stage-common rules
// ============================================================================

const COMMON_GERMINATION: &[AdvisoryRule] = &[
    rule(Rain7dAbove(IRRIGATION_DELAY_RAIN_MM), Recommend("Delay irrigation until after expected rainfall")),
    rule(Always, Recommend("Monitor soil moisture in the seed zone")),
];

const COMMON_EMERGENCE: &[AdvisoryRule] = &[
    rule(Rain7dAbove(IRRIGATION_DELAY_RAIN_MM), Recommend("Delay irrigation until after expected rainfall")),
    rule(Always, Recommend("Scout for pests and uneven emergence")),
];

const COMMON_VEGETATIVE: &[AdvisoryRule] = &[
    rule(Rain7dAbove(IRRIGATION_DELAY_RAIN_MM), Recommend("Delay irrigation until after expected rainfall")),
    rule(Always, Recommend("Monitor nutrient status and weed pressure")),
];

const COMMON_FLOWERING: &[AdvisoryRule] = &[
    rule(Rain7dAbove(IRRIGATION_DELAY_RAIN_MM), Recommend("Delay irrigation until after expected rainfall")),
    rule(WindAbove(8.0), Recommend("Avoid spraying during flowering in windy conditions")),
    rule(Always, Recommend("Avoid any moisture stress during flowering")),
];

const COMMON_FRUITING: &[AdvisoryRule] = &[
    rule(Rain7dAbove(IRRIGATION_DELAY_RAIN_MM), Recommend("Delay irrigation until after expected rainfall")),
    rule(Always, Recommend("Keep soil moisture steady through fruit and seed fill")),
];

const COMMON_MATURITY: &[AdvisoryRule] = &[
    rule(AlertAtLeast(AlertType::Storm, AlertSeverity::Watch), Risk("Approaching storm may damage a mature crop; consider harvesting early")),
    rule(Always, Recommend("Reduce irrigation and plan harvest logistics")),
];

/// Irrigation guidance scaled to the stage's water demand; none once the crop is maturing
pub fn irrigation_rule(stage: GrowthStage) -> Option<AdvisoryRule> {
    if stage == GrowthStage::Maturity {
        return None;
    }
    let advice = match stage.water_demand() {
        WaterDemand::Low => rule(
            Rain7dBelow(5.0),
            Recommend("Light irrigation to keep the root zone moist"),
        ),
        WaterDemand::Moderate => rule(
            Rain7dBelow(IRRIGATION_DELAY_RAIN_MM),
            Recommend("Schedule irrigation to meet moderate water demand"),
        ),
        WaterDemand::High => rule(
            Rain7dAtMost(IRRIGATION_DELAY_RAIN_MM),
            Recommend("Water demand is high; irrigate to cover the rainfall shortfall"),
        ),
    };
    Some(advice)
}

/// Crop-specific rules, or None when the pair is not supported
pub fn crop_rules(crop: CropType, stage: GrowthStage) -> Option<&'static [AdvisoryRule]> {
    use CropType::*;
    use GrowthStage::*;

    match (crop, stage) {
        (Corn, Germination) => Some(CORN_GERMINATION),
        (Corn, Emergence) => Some(CORN_EMERGENCE),
        (Corn, Vegetative) => Some(CORN_VEGETATIVE),
        (Corn, Flowering) => Some(CORN_FLOWERING),
        (Corn, Maturity) => Some(CORN_MATURITY),
        (Soybean, Germination) => Some(SOYBEAN_GERMINATION),
        (Soybean, Emergence) => Some(SOYBEAN_EMERGENCE),
        (Soybean, Vegetative) => Some(SOYBEAN_VEGETATIVE),
        (Soybean, Flowering) => Some(SOYBEAN_FLOWERING),
        (Soybean, Fruiting) => Some(SOYBEAN_FRUITING),
        (Soybean, Maturity) => Some(SOYBEAN_MATURITY),
        (Wheat, Germination) => Some(WHEAT_GERMINATION),
        (Wheat, Emergence) => Some(WHEAT_EMERGENCE),
        (Wheat, Vegetative) => Some(WHEAT_VEGETATIVE),
        (Wheat, Flowering) => Some(WHEAT_FLOWERING),
        (Wheat, Maturity) => Some(WHEAT_MATURITY),
        (Rice, Germination) => Some(RICE_GERMINATION),
        (Rice, Emergence) => Some(RICE_EMERGENCE),
        (Rice, Vegetative) => Some(RICE_VEGETATIVE),
        (Rice, Flowering) => Some(RICE_FLOWERING),
        (Rice, Maturity) => Some(RICE_MATURITY),
        (Corn | Wheat | Rice, Fruiting) => None,
    }
}

/// Rules shared by every crop at a stage
pub fn stage_rules(stage: GrowthStage) -> &'static [AdvisoryRule] {
    match stage {
        GrowthStage::Germination => COMMON_GERMINATION,
        GrowthStage::Emergence => COMMON_EMERGENCE,
        GrowthStage::Vegetative => COMMON_VEGETATIVE,
        GrowthStage::Flowering => COMMON_FLOWERING,
        GrowthStage::Fruiting => COMMON_FRUITING,
        GrowthStage::Maturity => COMMON_MATURITY,
    }
}

/// Derives crop advisories from a consensus forecast
#[derive(Debug, Clone, Default)]
pub struct CropAdvisoryEngine;

impl CropAdvisoryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn advise(
        &self,
        crop: CropType,
        stage: GrowthStage,
        forecast: &ConsensusForecast,
        alerts: &[WeatherAlert],
    ) -> CropAdvisory {
        let Some(specific) = crop_rules(crop, stage) else {
            tracing::warn!(
                crop_type = %crop,
                growth_stage = %stage,
                field_id = %forecast.field_id,
                "No advisory rules for crop and growth stage"
            );
            return CropAdvisory::empty(crop, stage);
        };

        let outlook = ForecastOutlook::new(forecast, alerts);
        let mut advisory = CropAdvisory::empty(crop, stage);

        let irrigation = irrigation_rule(stage);
        for rule in specific.iter().chain(stage_rules(stage)).chain(irrigation.iter()) {
            if !outlook.matches(&rule.condition) {
                continue;
            }
            match rule.outcome {
                Recommend(text) => advisory.recommendations.push(text.to_string()),
                Risk(text) => advisory.risks.push(text.to_string()),
                Opportunity(text) => advisory.opportunities.push(text.to_string()),
            }
        }

        advisory.confidence = forecast.metadata.confidence * stage.forecast_weight();
        advisory
    }
}
