//! HTTP surface tests driven through the router with `oneshot`

mod common;

use std::sync::Arc;

use agrocast_backend::services::{CsvObservationStore, ForecastService, StaticFieldMetadata, TrendService};
use agrocast_backend::{create_app, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use common::{test_config, Behavior, MockProvider};

const OBSERVATIONS: &str = "\
latitude,longitude,observed_on,temp_max_c,temp_min_c,precipitation_mm
41.590,-93.620,2024-07-01,30.0,10.0,0.0
41.590,-93.620,2024-07-02,28.0,12.0,3.0
";

fn app_with(providers: Vec<MockProvider>) -> Router {
    let config = test_config();
    let providers = providers.into_iter().map(MockProvider::into_arc).collect();
    let forecast = ForecastService::new(providers, Arc::new(StaticFieldMetadata::new()), &config);
    let store = CsvObservationStore::from_reader(
        csv::Reader::from_reader(OBSERVATIONS.as_bytes()),
        config.trends.grid_tolerance_deg,
    )
    .unwrap();
    let trends = TrendService::new(Arc::new(store), config.trends.clone());

    create_app(AppState {
        forecast,
        trends,
        db: None,
        config: Arc::new(config),
    })
}

fn app() -> Router {
    app_with(vec![MockProvider::new("a", 14.0), MockProvider::new("b", 16.0)])
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health_reports_no_database() {
    let (status, body) = get(app(), "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["database"], "not configured");
    assert_eq!(body["cachedForecasts"], 0);
}

#[tokio::test]
async fn test_field_forecast_returns_consensus() {
    let (status, body) =
        get(app(), "/api/v1/forecast?latitude=41.59&longitude=-93.62&fieldId=north-40").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fieldId"], "north-40");
    assert!((body["current"]["temperatureC"].as_f64().unwrap() - 15.0).abs() < 1e-9);
    assert_eq!(body["metadata"]["sources"].as_array().unwrap().len(), 2);
    assert!(body["metadata"]["confidence"].as_f64().unwrap() < 1.0);
}

#[tokio::test]
async fn test_out_of_range_latitude_is_bad_request() {
    let (status, body) =
        get(app(), "/api/v1/forecast?latitude=95&longitude=-93.62&fieldId=north-40").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "latitude");
}

#[tokio::test]
async fn test_all_providers_down_is_service_unavailable() {
    let app = app_with(vec![
        MockProvider::new("a", 14.0).behaving(Behavior::Fail),
        MockProvider::new("b", 16.0).behaving(Behavior::Fail),
    ]);
    let (status, body) =
        get(app, "/api/v1/forecast?latitude=41.59&longitude=-93.62&fieldId=north-40").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "FORECAST_UNAVAILABLE");
}

#[tokio::test]
async fn test_crop_forecast_includes_advisory() {
    let (status, body) = get(
        app(),
        "/api/v1/forecast/crop?latitude=41.59&longitude=-93.62&cropType=corn&growthStage=vegetative&fieldId=north-40",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["advisory"]["cropType"], "corn");
    assert_eq!(body["advisory"]["growthStage"], "vegetative");
    assert!(!body["advisory"]["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_crop_is_bad_request() {
    let (status, body) = get(
        app(),
        "/api/v1/forecast/crop?latitude=41.59&longitude=-93.62&cropType=barley&growthStage=vegetative&fieldId=north-40",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "cropType");
}

#[tokio::test]
async fn test_trends_from_csv_store() {
    let (status, body) = get(
        app(),
        "/api/v1/trends?latitude=41.59&longitude=-93.62&startDate=2024-07-01&endDate=2024-07-03",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["observedDays"], 2);
    assert_eq!(body["summary"]["missingDays"], 1);
    assert_eq!(body["summary"]["wetDays"], 1);
}

#[tokio::test]
async fn test_reversed_trend_window_is_bad_request() {
    let (status, body) = get(
        app(),
        "/api/v1/trends?latitude=41.59&longitude=-93.62&startDate=2024-07-03&endDate=2024-07-01",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "dateRange");
}
