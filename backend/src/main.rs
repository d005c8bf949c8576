//! Agrocast - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use agrocast_backend::{
    config::Config,
    create_app,
    external::build_providers,
    services::{
        CsvObservationStore, FieldMetadataProvider, ForecastService, HistoricalObservationStore,
        PgFieldMetadata, PgObservationStore, StaticFieldMetadata, TrendService,
    },
    AppState,
};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Agrocast forecasting server");
    tracing::info!("Environment: {}", config.environment);

    let db_pool = match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("Migrations completed");
            }
            Some(pool)
        }
        None => {
            tracing::warn!("No database configured; field metadata and observations are limited");
            None
        }
    };

    let providers = build_providers(&config.providers)?;

    let metadata: Arc<dyn FieldMetadataProvider> = match &db_pool {
        Some(pool) => Arc::new(PgFieldMetadata::new(pool.clone())),
        None => Arc::new(StaticFieldMetadata::new()),
    };

    let store: Arc<dyn HistoricalObservationStore> =
        match (&config.trends.csv_path, &db_pool) {
            (Some(path), _) => Arc::new(
                CsvObservationStore::from_path(path, config.trends.grid_tolerance_deg)
                    .with_context(|| format!("loading observations from {}", path))?,
            ),
            (None, Some(pool)) => Arc::new(PgObservationStore::new(
                pool.clone(),
                config.trends.grid_tolerance_deg,
            )),
            (None, None) => anyhow::bail!(
                "historical observations need either trends.csv_path or database.url"
            ),
        };

    // Create application state
    let state = AppState {
        forecast: ForecastService::new(providers, metadata, &config),
        trends: TrendService::new(store, config.trends.clone()),
        db: db_pool,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize tracing; `AGROCAST_LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "agrocast_server=debug,agrocast_backend=debug,tower_http=debug,sqlx=warn".into()
    });

    let json = std::env::var("AGROCAST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
