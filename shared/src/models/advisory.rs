//! Crop advisory models

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unknown enum value in a request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Supported crops
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CropType {
    Corn,
    Soybean,
    Wheat,
    Rice,
}

impl CropType {
    pub const ALL: [CropType; 4] = [
        CropType::Corn,
        CropType::Soybean,
        CropType::Wheat,
        CropType::Rice,
    ];
}

impl std::str::FromStr for CropType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corn" | "maize" => Ok(CropType::Corn),
            "soybean" | "soy" => Ok(CropType::Soybean),
            "wheat" => Ok(CropType::Wheat),
            "rice" => Ok(CropType::Rice),
            _ => Err(ParseEnumError {
                kind: "crop type",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CropType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CropType::Corn => write!(f, "corn"),
            CropType::Soybean => write!(f, "soybean"),
            CropType::Wheat => write!(f, "wheat"),
            CropType::Rice => write!(f, "rice"),
        }
    }
}

/// Phenological stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStage {
    Germination,
    Emergence,
    Vegetative,
    Flowering,
    Fruiting,
    Maturity,
}

/// Relative water demand of a growth stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WaterDemand {
    Low,
    Moderate,
    High,
}

impl GrowthStage {
    pub const ALL: [GrowthStage; 6] = [
        GrowthStage::Germination,
        GrowthStage::Emergence,
        GrowthStage::Vegetative,
        GrowthStage::Flowering,
        GrowthStage::Fruiting,
        GrowthStage::Maturity,
    ];

    /// How sensitive decisions at this stage are to forecast error, in (0, 1]
    pub fn forecast_weight(&self) -> f64 {
        match self {
            GrowthStage::Germination => 0.6,
            GrowthStage::Emergence => 0.7,
            GrowthStage::Vegetative => 0.8,
            GrowthStage::Flowering => 1.0,
            GrowthStage::Fruiting => 0.9,
            GrowthStage::Maturity => 0.7,
        }
    }

    pub fn water_demand(&self) -> WaterDemand {
        match self {
            GrowthStage::Germination | GrowthStage::Emergence | GrowthStage::Maturity => {
                WaterDemand::Low
            }
            GrowthStage::Vegetative => WaterDemand::Moderate,
            GrowthStage::Flowering | GrowthStage::Fruiting => WaterDemand::High,
        }
    }
}

impl std::str::FromStr for GrowthStage {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "germination" => Ok(GrowthStage::Germination),
            "emergence" => Ok(GrowthStage::Emergence),
            "vegetative" => Ok(GrowthStage::Vegetative),
            "flowering" => Ok(GrowthStage::Flowering),
            "fruiting" => Ok(GrowthStage::Fruiting),
            "maturity" => Ok(GrowthStage::Maturity),
            _ => Err(ParseEnumError {
                kind: "growth stage",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrowthStage::Germination => write!(f, "germination"),
            GrowthStage::Emergence => write!(f, "emergence"),
            GrowthStage::Vegetative => write!(f, "vegetative"),
            GrowthStage::Flowering => write!(f, "flowering"),
            GrowthStage::Fruiting => write!(f, "fruiting"),
            GrowthStage::Maturity => write!(f, "maturity"),
        }
    }
}

/// Crop and stage specific guidance derived from a forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CropAdvisory {
    pub crop_type: CropType,
    pub growth_stage: GrowthStage,
    pub recommendations: Vec<String>,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    pub confidence: f64,
}

impl CropAdvisory {
    /// Advisory with no guidance and zero confidence
    pub fn empty(crop_type: CropType, growth_stage: GrowthStage) -> Self {
        Self {
            crop_type,
            growth_stage,
            recommendations: Vec::new(),
            risks: Vec::new(),
            opportunities: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty() && self.risks.is_empty() && self.opportunities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crop_type() {
        assert_eq!("Corn".parse::<CropType>(), Ok(CropType::Corn));
        assert_eq!(" maize ".parse::<CropType>(), Ok(CropType::Corn));
        assert!("coffee".parse::<CropType>().is_err());
    }

    #[test]
    fn test_parse_growth_stage_round_trips_display() {
        for stage in GrowthStage::ALL {
            assert_eq!(stage.to_string().parse::<GrowthStage>(), Ok(stage));
        }
        let err = "tasseling".parse::<GrowthStage>().unwrap_err();
        assert_eq!(err.to_string(), "unknown growth stage: tasseling");
    }

    #[test]
    fn test_stage_weights_bounded() {
        for stage in GrowthStage::ALL {
            let w = stage.forecast_weight();
            assert!(w > 0.0 && w <= 1.0);
        }
        assert_eq!(GrowthStage::Flowering.water_demand(), WaterDemand::High);
    }

    #[test]
    fn test_empty_advisory() {
        let advisory = CropAdvisory::empty(CropType::Rice, GrowthStage::Fruiting);
        assert!(advisory.is_empty());
        assert_eq!(advisory.confidence, 0.0);
    }
}
