//! Weather alert models

use serde::{Deserialize, Serialize};

/// Hazard categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    Frost,
    HeavyPrecipitation,
    HighWind,
    Storm,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Frost => write!(f, "frost"),
            AlertType::HeavyPrecipitation => write!(f, "heavy-precipitation"),
            AlertType::HighWind => write!(f, "high-wind"),
            AlertType::Storm => write!(f, "storm"),
        }
    }
}

/// Alert severity tiers, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Advisory,
    Watch,
    Warning,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Advisory => write!(f, "advisory"),
            AlertSeverity::Watch => write!(f, "watch"),
            AlertSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// Farming guidance attached to an alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FarmingImpact {
    pub recommendations: Vec<String>,
}

/// A triggered hazard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub description: String,
    /// The forecast value that crossed the threshold
    pub trigger_value: f64,
    pub farming_impact: FarmingImpact,
}

impl WeatherAlert {
    pub fn is_at_least(&self, alert_type: AlertType, severity: AlertSeverity) -> bool {
        self.alert_type == alert_type && self.severity >= severity
    }
}
