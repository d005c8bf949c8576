//! Forecast pipeline integration tests
//!
//! Covers provider fan-out, fusion confidence, topographic adjustment,
//! caching and request validation through `ForecastService`.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agrocast_backend::error::AppError;
use agrocast_backend::services::{
    EnsembleFusion, FieldMetadataProvider, FieldProfile, ForecastCache, ForecastKey,
    ForecastService, SourceAggregator, StaticFieldMetadata, MAX_CONFIDENCE,
};
use async_trait::async_trait;
use common::{calm_from_now, forecast_from, test_config, Behavior, MockProvider};
use proptest::prelude::*;
use shared::{AdjustmentFactor, Coordinate, FieldContext, RawProviderSeries};
use tokio_test::{assert_err, assert_ok};

fn service(providers: Vec<MockProvider>) -> ForecastService {
    service_with_metadata(providers, Arc::new(StaticFieldMetadata::new()))
}

fn service_with_metadata(
    providers: Vec<MockProvider>,
    metadata: Arc<dyn FieldMetadataProvider>,
) -> ForecastService {
    let providers = providers.into_iter().map(MockProvider::into_arc).collect();
    ForecastService::new(providers, metadata, &test_config())
}

struct FailingMetadata;

#[async_trait]
impl FieldMetadataProvider for FailingMetadata {
    async fn field_context(
        &self,
        _field_id: &str,
        _coordinate: &Coordinate,
    ) -> agrocast_backend::AppResult<FieldContext> {
        Err(AppError::FieldMetadata("metadata service down".into()))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A timed-out provider is dropped and lowers confidence
    #[tokio::test]
    async fn test_timeout_degrades_to_two_sources() {
        let degraded = service(vec![
            MockProvider::new("a", 15.0),
            MockProvider::new("b", 15.0),
            MockProvider::new("slow", 15.0).delayed(Duration::from_secs(2)),
        ]);
        let forecast = assert_ok!(degraded.get_field_forecast(41.59, -93.62, None, "f1").await);

        assert_eq!(forecast.metadata.sources, vec!["a", "b"]);
        assert_eq!(forecast.metadata.failed_sources, vec!["slow"]);

        let healthy = service(vec![
            MockProvider::new("a", 15.0),
            MockProvider::new("b", 15.0),
            MockProvider::new("c", 15.0),
        ]);
        let full = assert_ok!(healthy.get_field_forecast(41.59, -93.62, None, "f1").await);

        assert_eq!(full.metadata.sources.len(), 3);
        assert!(forecast.metadata.confidence < full.metadata.confidence);
        assert!(full.metadata.confidence <= MAX_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_unavailable() {
        let service = service(vec![
            MockProvider::new("a", 15.0).behaving(Behavior::Fail),
            MockProvider::new("b", 15.0).behaving(Behavior::Panic),
            MockProvider::new("c", 15.0).delayed(Duration::from_secs(2)),
        ]);
        let err = assert_err!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert!(matches!(err, AppError::ForecastUnavailable { attempted: 3 }));
    }

    #[tokio::test]
    async fn test_partial_and_implausible_payloads_are_dropped() {
        let service = service(vec![
            MockProvider::new("good", 15.0),
            MockProvider::new("partial", 15.0).behaving(Behavior::Partial(10)),
            MockProvider::new("broken", 15.0).behaving(Behavior::Implausible),
            MockProvider::new("empty", 15.0).behaving(Behavior::Partial(0)),
        ]);
        let forecast = assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert_eq!(forecast.metadata.sources, vec!["good"]);
        assert_eq!(
            forecast.metadata.failed_sources,
            vec!["partial", "broken", "empty"]
        );
    }

    /// Two concurrent identical requests share one fan-out
    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let a = MockProvider::new("a", 15.0).delayed(Duration::from_millis(50));
        let b = MockProvider::new("b", 16.0).delayed(Duration::from_millis(50));
        let (calls_a, calls_b) = (a.call_counter(), b.call_counter());
        let service = service(vec![a, b]);

        let (first, second) = tokio::join!(
            service.get_field_forecast(41.59, -93.62, None, "f1"),
            service.get_field_forecast(41.59, -93.62, None, "f1"),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// A caller that gives up does not make the next caller start over
    #[tokio::test]
    async fn test_cancelled_waiter_does_not_restart_computation() {
        let a = MockProvider::new("a", 15.0).delayed(Duration::from_millis(150));
        let calls = a.call_counter();
        let service = service(vec![a]);

        let (impatient, patient) = tokio::join!(
            tokio::time::timeout(
                Duration::from_millis(40),
                service.get_field_forecast(41.59, -93.62, None, "f1"),
            ),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                service.get_field_forecast(41.59, -93.62, None, "f1").await
            },
        );

        assert!(impatient.is_err());
        assert_ok!(patient);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_computation_still_populates_cache() {
        let a = MockProvider::new("a", 15.0).delayed(Duration::from_millis(150));
        let calls = a.call_counter();
        let service = service(vec![a]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(40),
            service.get_field_forecast(41.59, -93.62, None, "f1"),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(service.cache().in_flight(), 0);
        assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_cache_entry() {
        let a = MockProvider::new("a", 15.0);
        let calls = a.call_counter();
        let service = service(vec![a]);

        assert_ok!(service.get_field_forecast(41.59001, -93.62001, None, "f1").await);
        assert_ok!(service.get_field_forecast(41.59012, -93.61996, None, "f1").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f2").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_entry_expires_after_ttl() {
        let a = MockProvider::new("a", 15.0);
        let calls = a.call_counter();
        let config = test_config();
        let cache = Arc::new(ForecastCache::new(Duration::from_millis(150), 100));
        let service = ForecastService::with_cache(
            vec![a.into_arc()],
            Arc::new(StaticFieldMetadata::new()),
            cache,
            &config,
        );

        assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ForecastCache::new(Duration::from_secs(60), 100);
        let key = ForecastKey::new(&Coordinate::new(1.0, 2.0, None), "f1", 3).unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));

        let compute = {
            let attempts = Arc::clone(&attempts);
            move || {
                let attempts = Arc::clone(&attempts);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AppError::ForecastUnavailable { attempted: 2 })
                    } else {
                        Ok(forecast_from(calm_from_now(48), 0.5))
                    }
                }
            }
        };

        let err = assert_err!(cache.get_or_compute(key.clone(), compute.clone()).await);
        assert!(matches!(err, AppError::ForecastUnavailable { attempted: 2 }));
        assert_ok!(cache.get_or_compute(key.clone(), compute).await);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(cache.get(&key).await.is_some());
    }

    /// A panicking computation falls through to one direct computation
    #[tokio::test]
    async fn test_cache_falls_through_on_panic() {
        let cache = ForecastCache::new(Duration::from_secs(60), 100);
        let key = ForecastKey::new(&Coordinate::new(1.0, 2.0, None), "f1", 3).unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));

        let compute = {
            let attempts = Arc::clone(&attempts);
            move || {
                let attempts = Arc::clone(&attempts);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("computation blew up");
                    }
                    Ok(forecast_from(calm_from_now(48), 0.5))
                }
            }
        };

        let forecast = assert_ok!(cache.get_or_compute(key.clone(), compute).await);
        assert_eq!(forecast.field_id, "field-1");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // The direct result is not cached
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_clear_and_entry_count() {
        let cache = ForecastCache::new(Duration::from_secs(60), 100);
        let key = ForecastKey::new(&Coordinate::new(1.0, 2.0, None), "f1", 3).unwrap();
        assert_ok!(
            cache
                .get_or_compute(key.clone(), || async { Ok(forecast_from(calm_from_now(48), 0.5)) })
                .await
        );
        assert_eq!(cache.entry_count().await, 1);

        cache.clear();
        assert!(cache.get(&key).await.is_none());
    }

    /// A field 1000 m above the model grid is corrected by exactly -6.5 °C
    #[tokio::test]
    async fn test_elevation_adjustment_magnitude() {
        let service = service(vec![
            MockProvider::new("a", 20.0).at_elevation(200.0),
            MockProvider::new("b", 20.0).at_elevation(200.0),
        ]);
        let forecast = assert_ok!(service.get_field_forecast(45.0, 7.0, Some(1200.0), "alp").await);

        let adjustments = &forecast.metadata.adjustments;
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].factor, AdjustmentFactor::Elevation);
        assert!((adjustments[0].magnitude + 6.5).abs() < 1e-9);
        assert!((forecast.current.temperature_c - 13.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_water_and_urban_field_gets_three_adjustments() {
        let metadata = StaticFieldMetadata::new()
            .with_field(
                "lakeside",
                FieldProfile {
                    elevation_m: Some(150.0),
                    near_water: true,
                    urban_density: Some(0.6),
                },
            )
            .with_field("open", FieldProfile {
                elevation_m: Some(150.0),
                ..FieldProfile::default()
            });
        let service = service_with_metadata(vec![MockProvider::new("a", 20.0)], Arc::new(metadata));

        let lakeside = assert_ok!(service.get_field_forecast(45.0, 7.0, None, "lakeside").await);
        let factors: Vec<_> = lakeside.metadata.adjustments.iter().map(|a| a.factor).collect();
        assert_eq!(
            factors,
            vec![
                AdjustmentFactor::Elevation,
                AdjustmentFactor::WaterProximity,
                AdjustmentFactor::UrbanHeatIsland
            ]
        );

        let open = assert_ok!(service.get_field_forecast(45.0, 7.0, None, "open").await);
        assert_eq!(open.metadata.adjustments.len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_failure_uses_plain_context() {
        let service = service_with_metadata(vec![MockProvider::new("a", 20.0)], Arc::new(FailingMetadata));
        let forecast = assert_ok!(service.get_field_forecast(45.0, 7.0, None, "f1").await);
        assert!(forecast.metadata.adjustments.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_io() {
        let a = MockProvider::new("a", 15.0);
        let calls = a.call_counter();
        let service = service(vec![a]);

        let err = assert_err!(service.get_field_forecast(91.0, 0.0, None, "f1").await);
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "latitude"));
        assert_err!(service.get_field_forecast(0.0, f64::NAN, None, "f1").await);
        assert_err!(service.get_field_forecast(0.0, 0.0, Some(12_000.0), "f1").await);
        assert_err!(service.get_field_forecast(0.0, 0.0, None, "  ").await);
        let err = assert_err!(
            service
                .get_crop_specific_forecast(0.0, 0.0, "coffee", "flowering", "f1")
                .await
        );
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "cropType"));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_crop_forecast_reuses_cached_forecast() {
        let a = MockProvider::new("a", 22.0);
        let calls = a.call_counter();
        let service = service(vec![a, MockProvider::new("b", 22.0)]);

        let (forecast, advisory) = assert_ok!(
            service
                .get_crop_specific_forecast(41.59, -93.62, "soybean", "fruiting", "f1")
                .await
        );
        assert!(!advisory.is_empty());
        assert!((advisory.confidence - forecast.metadata.confidence * 0.9).abs() < 1e-12);

        let (_, miss) = assert_ok!(
            service
                .get_crop_specific_forecast(41.59, -93.62, "corn", "fruiting", "f1")
                .await
        );
        assert!(miss.is_empty());
        assert_eq!(miss.confidence, 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_urban_density_is_ignored() {
        let metadata = StaticFieldMetadata::new().with_field(
            "downtown",
            FieldProfile {
                elevation_m: None,
                near_water: false,
                urban_density: Some(25.0),
            },
        );
        let service = service_with_metadata(vec![MockProvider::new("a", 20.0)], Arc::new(metadata));

        let forecast = assert_ok!(service.get_field_forecast(45.0, 7.0, None, "downtown").await);
        assert!(forecast
            .metadata
            .adjustments
            .iter()
            .all(|a| a.factor != AdjustmentFactor::UrbanHeatIsland));
        assert!((forecast.current.temperature_c - 20.0).abs() < 1e-9);
    }

    /// The overall deadline cuts the fan-out short even when the per-provider timeout is longer
    #[tokio::test]
    async fn test_overall_deadline_returns_completed_subset() {
        let mut config = test_config();
        config.providers.per_provider_timeout_ms = 2_000;
        config.providers.overall_deadline_ms = 150;
        let providers = vec![
            MockProvider::new("fast", 15.0).into_arc(),
            MockProvider::new("slow", 15.0)
                .delayed(Duration::from_secs(1))
                .into_arc(),
        ];
        let aggregator = SourceAggregator::new(providers.clone(), &config.providers);

        let started = std::time::Instant::now();
        let report = assert_ok!(
            aggregator
                .aggregate(&Coordinate::new(41.59, -93.62, None), "f1")
                .await
        );
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(report.sources(), vec!["fast"]);
        assert_eq!(report.failed_sources(), vec!["slow"]);
        assert!(report.failures[0].reason.contains("timed out"));
        assert_eq!(report.attempted, 2);

        let service =
            ForecastService::new(providers, Arc::new(StaticFieldMetadata::new()), &config);
        let forecast = assert_ok!(service.get_field_forecast(41.59, -93.62, None, "f1").await);
        assert_eq!(forecast.metadata.sources, vec!["fast"]);
        assert_eq!(forecast.metadata.failed_sources, vec!["slow"]);
    }

    /// A provider that crashed before the deadline is reported as a failure, not a timeout
    #[tokio::test]
    async fn test_crashed_provider_keeps_its_reason_past_deadline() {
        let mut config = test_config();
        config.providers.per_provider_timeout_ms = 2_000;
        config.providers.overall_deadline_ms = 150;
        let aggregator = SourceAggregator::new(
            vec![
                MockProvider::new("fast", 15.0).into_arc(),
                MockProvider::new("crash", 15.0)
                    .behaving(Behavior::Panic)
                    .into_arc(),
                MockProvider::new("slow", 15.0)
                    .delayed(Duration::from_secs(1))
                    .into_arc(),
            ],
            &config.providers,
        );

        let report = assert_ok!(
            aggregator
                .aggregate(&Coordinate::new(41.59, -93.62, None), "f1")
                .await
        );
        assert_eq!(report.sources(), vec!["fast"]);
        assert_eq!(report.failed_sources(), vec!["crash", "slow"]);
        assert!(report.failures[0].reason.contains("task failed"), "{}", report.failures[0].reason);
        assert!(report.failures[1].reason.contains("timed out"), "{}", report.failures[1].reason);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series_strategy() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
        // (temperature, humidity, wind) per source
        prop::collection::vec((-30.0f64..45.0, 0.0f64..100.0, 0.0f64..40.0), 0..6)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Confidence stays within [0, MAX_CONFIDENCE]
        #[test]
        fn prop_confidence_bounded(sources in series_strategy(), configured in 1usize..8) {
            let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let series: Vec<RawProviderSeries> = sources
                .iter()
                .enumerate()
                .map(|(i, (temp, humidity, wind))| {
                    let mut samples = common::hourly_samples(start, 24, *temp);
                    for s in samples.iter_mut() {
                        s.humidity_pct = *humidity;
                        s.wind_speed_mps = *wind;
                    }
                    RawProviderSeries {
                        source: format!("p{}", i),
                        model_elevation_m: None,
                        samples,
                        fetched_at: start,
                    }
                })
                .collect();

            let result = EnsembleFusion::new(configured).fuse(&series);
            prop_assert!(result.confidence >= 0.0);
            prop_assert!(result.confidence <= MAX_CONFIDENCE);
            prop_assert!(result.confidence < 1.0);
        }

        /// Adding an agreeing source never lowers confidence
        #[test]
        fn prop_more_agreeing_sources_raise_confidence(n in 1usize..5, temp in -10.0f64..35.0) {
            let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let make = |count: usize| -> Vec<RawProviderSeries> {
                (0..count)
                    .map(|i| RawProviderSeries {
                        source: format!("p{}", i),
                        model_elevation_m: None,
                        samples: common::hourly_samples(start, 24, temp),
                        fetched_at: start,
                    })
                    .collect()
            };
            let fusion = EnsembleFusion::new(5);
            let fewer = fusion.fuse(&make(n)).confidence;
            let more = fusion.fuse(&make(n + 1)).confidence;
            prop_assert!(more >= fewer);
        }
    }
}
