//! Forecast orchestration
//!
//! Cache lookup, then on a miss: field metadata, provider fan-out, fusion,
//! topographic correction, assembly and alert evaluation.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    validate_coordinate, validate_field_id, validate_latitude, validate_longitude,
    ConsensusForecast, Coordinate, CropAdvisory, CropType, FieldContext, ForecastMetadata,
    GrowthStage,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::WeatherProvider;
use crate::services::{
    AlertEngine, CropAdvisoryEngine, EnsembleFusion, FieldMetadataProvider, ForecastCache,
    ForecastKey, SourceAggregator, TopographicAdjuster,
};

/// The uncached forecast pipeline
struct Pipeline {
    aggregator: SourceAggregator,
    fusion: EnsembleFusion,
    adjuster: TopographicAdjuster,
    alerts: AlertEngine,
    metadata: Arc<dyn FieldMetadataProvider>,
}

impl Pipeline {
    async fn field_context(&self, field_id: &str, coordinate: &Coordinate) -> FieldContext {
        match self.metadata.field_context(field_id, coordinate).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(field_id, error = %e, "Field metadata unavailable, using plain context");
                FieldContext::plain(field_id, *coordinate)
            }
        }
    }

    async fn run(&self, coordinate: Coordinate, field_id: String) -> AppResult<ConsensusForecast> {
        let started = std::time::Instant::now();
        let context = self.field_context(&field_id, &coordinate).await;

        let report = self.aggregator.aggregate(&context.coordinate, &field_id).await?;
        let fused = self.fusion.fuse(&report.series);
        let (series, adjustments) = self.adjuster.adjust(fused.series, &context);

        let metadata = ForecastMetadata {
            forecast_id: Uuid::new_v4(),
            issued_at: Utc::now(),
            sources: report.sources(),
            failed_sources: report.failed_sources(),
            confidence: fused.confidence,
            adjustments,
        };

        let mut forecast =
            ConsensusForecast::assemble(field_id.as_str(), context.coordinate, &series, metadata)
                .ok_or_else(|| {
                    tracing::warn!(field_id = %field_id, "Provider data holds no current or future hours");
                    AppError::ForecastUnavailable {
                        attempted: report.attempted,
                    }
                })?;
        forecast.alerts = self.alerts.evaluate(&forecast);

        tracing::info!(
            field_id = %field_id,
            forecast_id = %forecast.metadata.forecast_id,
            confidence = forecast.metadata.confidence,
            alerts = forecast.alerts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Consensus forecast computed"
        );

        Ok(forecast)
    }
}

/// Entry points for field forecasts and crop advisories
#[derive(Clone)]
pub struct ForecastService {
    pipeline: Arc<Pipeline>,
    advisory: Arc<CropAdvisoryEngine>,
    cache: Arc<ForecastCache>,
    grid_decimals: u32,
}

impl ForecastService {
    /// Build the service with a fresh cache
    pub fn new(
        providers: Vec<Arc<dyn WeatherProvider>>,
        metadata: Arc<dyn FieldMetadataProvider>,
        config: &Config,
    ) -> Self {
        Self::with_cache(
            providers,
            metadata,
            Arc::new(ForecastCache::from_config(&config.cache)),
            config,
        )
    }

    /// Build the service around an existing cache instance
    pub fn with_cache(
        providers: Vec<Arc<dyn WeatherProvider>>,
        metadata: Arc<dyn FieldMetadataProvider>,
        cache: Arc<ForecastCache>,
        config: &Config,
    ) -> Self {
        let fusion = EnsembleFusion::from_providers(&providers);
        let pipeline = Pipeline {
            aggregator: SourceAggregator::new(providers, &config.providers),
            fusion,
            adjuster: TopographicAdjuster::new(config.topography.clone()),
            alerts: AlertEngine::new(config.alerts.clone()),
            metadata,
        };

        Self {
            pipeline: Arc::new(pipeline),
            advisory: Arc::new(CropAdvisoryEngine::new()),
            cache,
            grid_decimals: config.cache.grid_decimals,
        }
    }

    pub fn cache(&self) -> &ForecastCache {
        &self.cache
    }

    /// Field-specific consensus forecast, served from cache when fresh
    #[tracing::instrument(skip(self))]
    pub async fn get_field_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        elevation_m: Option<f64>,
        field_id: &str,
    ) -> AppResult<Arc<ConsensusForecast>> {
        let coordinate = Coordinate::new(latitude, longitude, elevation_m);
        validate_request(&coordinate, field_id)?;

        let key = ForecastKey::new(&coordinate, field_id, self.grid_decimals)?;
        let pipeline = Arc::clone(&self.pipeline);
        let field_id = field_id.to_string();

        self.cache
            .get_or_compute(key, move || {
                let pipeline = Arc::clone(&pipeline);
                let field_id = field_id.clone();
                async move { pipeline.run(coordinate, field_id).await }
            })
            .await
    }

    /// Forecast plus an advisory for the crop at its growth stage
    #[tracing::instrument(skip(self))]
    pub async fn get_crop_specific_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        crop_type: &str,
        growth_stage: &str,
        field_id: &str,
    ) -> AppResult<(Arc<ConsensusForecast>, CropAdvisory)> {
        let crop: CropType = crop_type
            .parse()
            .map_err(|e: shared::ParseEnumError| AppError::validation("cropType", e.to_string()))?;
        let stage: GrowthStage = growth_stage
            .parse()
            .map_err(|e: shared::ParseEnumError| AppError::validation("growthStage", e.to_string()))?;

        let forecast = self
            .get_field_forecast(latitude, longitude, None, field_id)
            .await?;
        let advisory = self.advisory.advise(crop, stage, &forecast, &forecast.alerts);

        Ok((forecast, advisory))
    }
}

fn validate_request(coordinate: &Coordinate, field_id: &str) -> AppResult<()> {
    validate_latitude(coordinate.latitude).map_err(|m| AppError::validation("latitude", m))?;
    validate_longitude(coordinate.longitude).map_err(|m| AppError::validation("longitude", m))?;
    validate_coordinate(coordinate).map_err(|m| AppError::validation("elevation", m))?;
    validate_field_id(field_id).map_err(|m| AppError::validation("fieldId", m))?;
    Ok(())
}
