//! Configuration management for the Agrocast engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with AGROCAST_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Weather provider fan-out configuration
    pub providers: ProvidersConfig,

    /// Forecast cache configuration
    pub cache: CacheConfig,

    /// Topographic correction parameters
    pub topography: TopographyConfig,

    /// Hazard thresholds
    pub alerts: AlertThresholds,

    /// Historical trend configuration
    pub trends: TrendConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; unset means no database-backed collaborators
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Timeout applied to each provider call independently
    pub per_provider_timeout_ms: u64,

    /// Deadline for the whole fan-out
    pub overall_deadline_ms: u64,

    /// Minimum valid hourly samples for a payload to count
    pub min_samples: usize,

    /// Forecast horizon requested from providers
    pub horizon_days: u32,

    pub open_meteo: OpenMeteoConfig,
    pub openweathermap: OpenWeatherMapConfig,
    pub met_norway: MetNorwayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenMeteoConfig {
    pub enabled: bool,
    pub base_url: String,
    pub reliability: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenWeatherMapConfig {
    /// Provider is only constructed when an API key is present
    pub api_key: Option<String>,
    pub base_url: String,
    /// "metric" or "imperial"
    pub units: String,
    pub reliability: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetNorwayConfig {
    pub enabled: bool,
    pub base_url: String,
    /// MET Norway rejects requests without an identifying User-Agent
    pub user_agent: String,
    pub reliability: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live
    pub ttl_secs: u64,

    /// Maximum number of cached forecasts
    pub max_capacity: u64,

    /// Decimal places kept when rounding coordinates into cache keys
    pub grid_decimals: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TopographyConfig {
    /// Used when no provider reports its model elevation
    pub reference_elevation_m: f64,

    /// Diurnal temperature range reduction near large water bodies (%)
    pub water_diurnal_reduction_pct: f64,

    /// Relative humidity increase near large water bodies (%)
    pub water_humidity_increase_pct: f64,

    /// Urban density above which the heat island offset applies
    pub urban_density_threshold: f64,

    /// Warming at full urban density (°C)
    pub urban_max_warming_c: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertThresholds {
    pub frost_watch_c: f64,
    pub frost_warning_c: f64,
    /// Rolling 24h accumulation (mm)
    pub heavy_precip_watch_mm: f64,
    pub heavy_precip_warning_mm: f64,
    /// Sustained wind (m/s)
    pub high_wind_advisory_mps: f64,
    pub high_wind_warning_mps: f64,
    /// Pressure fall within 3h (hPa)
    pub storm_pressure_drop_hpa: f64,
    pub storm_pressure_drop_warning_hpa: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrendConfig {
    pub base_temperature_c: f64,
    pub dry_day_threshold_mm: f64,
    pub max_window_days: i64,
    /// Matching tolerance for station coordinates (degrees)
    pub grid_tolerance_deg: f64,
    /// Serve observations from a CSV file instead of the database
    pub csv_path: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AGROCAST_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGROCAST_ prefix)
            .add_source(
                Environment::with_prefix("AGROCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl ProvidersConfig {
    pub fn per_provider_timeout(&self) -> Duration {
        Duration::from_millis(self.per_provider_timeout_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout_ms: 5_000,
            overall_deadline_ms: 8_000,
            min_samples: 24,
            horizon_days: 7,
            open_meteo: OpenMeteoConfig::default(),
            openweathermap: OpenWeatherMapConfig::default(),
            met_norway: MetNorwayConfig::default(),
        }
    }
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.open-meteo.com/v1".to_string(),
            reliability: 1.0,
        }
    }
}

impl Default for OpenWeatherMapConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            units: "metric".to_string(),
            reliability: 0.8,
        }
    }
}

impl Default for MetNorwayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.met.no/weatherapi/locationforecast/2.0".to_string(),
            user_agent: "agrocast/0.1 ops@agrocast.example".to_string(),
            reliability: 1.0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_capacity: 10_000,
            grid_decimals: 3,
        }
    }
}

impl Default for TopographyConfig {
    fn default() -> Self {
        Self {
            reference_elevation_m: 0.0,
            water_diurnal_reduction_pct: 15.0,
            water_humidity_increase_pct: 5.0,
            urban_density_threshold: 0.3,
            urban_max_warming_c: 2.0,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            frost_watch_c: 2.0,
            frost_warning_c: 0.0,
            heavy_precip_watch_mm: 25.0,
            heavy_precip_warning_mm: 50.0,
            high_wind_advisory_mps: 10.0,
            high_wind_warning_mps: 17.0,
            storm_pressure_drop_hpa: 6.0,
            storm_pressure_drop_warning_hpa: 10.0,
        }
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            base_temperature_c: shared::DEFAULT_GDD_BASE_C,
            dry_day_threshold_mm: shared::DEFAULT_DRY_DAY_THRESHOLD_MM,
            max_window_days: 3660,
            grid_tolerance_deg: 0.01,
            csv_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_constants() {
        let config = Config::default();
        assert_eq!(config.cache.ttl(), Duration::from_secs(600));
        assert_eq!(config.providers.per_provider_timeout(), Duration::from_secs(5));
        assert_eq!(config.alerts.frost_watch_c, 2.0);
        assert_eq!(config.trends.base_temperature_c, 10.0);
    }
}
