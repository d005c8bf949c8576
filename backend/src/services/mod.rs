//! Engine services for the Agrocast forecasting pipeline

pub mod advisory;
pub mod aggregator;
pub mod alerts;
pub mod cache;
pub mod forecast;
pub mod fusion;
pub mod metadata;
pub mod observations;
pub mod topography;
pub mod trends;

pub use advisory::{
    irrigation_rule, AdvisoryRule, Condition, CropAdvisoryEngine, ForecastOutlook, Outcome,
};
pub use aggregator::{AggregationReport, ProviderFailure, SourceAggregator};
pub use alerts::AlertEngine;
pub use cache::{ForecastCache, ForecastKey};
pub use forecast::ForecastService;
pub use fusion::{EnsembleFusion, FusionResult, MAX_CONFIDENCE};
pub use metadata::{FieldMetadataProvider, FieldProfile, PgFieldMetadata, StaticFieldMetadata};
pub use observations::{CsvObservationStore, HistoricalObservationStore, PgObservationStore};
pub use topography::TopographicAdjuster;
pub use trends::TrendService;
