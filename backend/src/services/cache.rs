//! Time-bounded forecast cache with single-flight computation
//!
//! Concurrent requests for the same key wait on one computation and share
//! its `Arc`. The computation runs as a detached task registered in an
//! in-flight table, so a waiter that is cancelled never restarts it for the
//! others. Errors are never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use shared::{ConsensusForecast, Coordinate};

use crate::config::CacheConfig;
use crate::error::{AppError, AppResult};

/// Cache key: coordinates rounded to the cache grid plus the field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastKey {
    pub latitude: Decimal,
    pub longitude: Decimal,
    /// Whole metres; a different field elevation yields different corrections
    pub elevation_m: Option<i64>,
    pub field_id: String,
}

impl ForecastKey {
    pub fn new(coordinate: &Coordinate, field_id: &str, grid_decimals: u32) -> AppResult<Self> {
        let round = |value: f64, field: &str| {
            Decimal::from_f64(value)
                .map(|d| d.round_dp(grid_decimals))
                .ok_or_else(|| AppError::validation(field, "Coordinate is not representable"))
        };

        Ok(Self {
            latitude: round(coordinate.latitude, "latitude")?,
            longitude: round(coordinate.longitude, "longitude")?,
            elevation_m: coordinate.elevation_m.map(|e| e.round() as i64),
            field_id: field_id.to_string(),
        })
    }
}

type FlightOutcome = Result<Arc<ConsensusForecast>, Arc<AppError>>;

/// A running computation any number of waiters can attach to
type Flight = Shared<BoxFuture<'static, FlightOutcome>>;

/// Computations in progress, tagged with a generation so a finished flight
/// only ever removes its own entry
type FlightTable = Arc<Mutex<HashMap<ForecastKey, (u64, Flight)>>>;

/// Forecast cache backed by moka
#[derive(Clone)]
pub struct ForecastCache {
    inner: Cache<ForecastKey, Arc<ConsensusForecast>>,
    in_flight: FlightTable,
    generation: Arc<AtomicU64>,
}

impl ForecastCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .build();
        Self {
            inner,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_capacity)
    }

    /// Return the cached forecast for `key`, computing it at most once
    /// across concurrent callers.
    ///
    /// The computation runs in its own task and stores its result even if
    /// every waiter has gone away. If that task panics or is aborted the
    /// failure is logged and this caller falls through to one direct,
    /// uncached computation.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: ForecastKey,
        compute: F,
    ) -> AppResult<Arc<ConsensusForecast>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<ConsensusForecast>> + Send + 'static,
    {
        let init = async {
            // A flight whose waiters were all cancelled may have finished since
            if let Some(hit) = self.inner.get(&key).await {
                return Ok(hit);
            }
            self.join_or_start(&key, &compute)
                .await
                .map_err(|e| AppError::from_shared(&e))
        };

        match self.inner.try_get_with(key.clone(), init).await {
            Ok(forecast) => Ok(forecast),
            Err(shared_error) => match shared_error.as_ref() {
                AppError::CacheComputation(reason) => {
                    tracing::error!(
                        field_id = %key.field_id,
                        reason = %reason,
                        "Cached forecast computation failed, computing directly"
                    );
                    compute().await.map(Arc::new)
                }
                other => Err(AppError::from_shared(other)),
            },
        }
    }

    /// Attach to the flight for `key`, starting one if none is running
    fn join_or_start<F, Fut>(&self, key: &ForecastKey, compute: &F) -> Flight
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<ConsensusForecast>> + Send + 'static,
    {
        let mut flights = lock(&self.in_flight);
        if let Some((_, flight)) = flights.get(key) {
            return flight.clone();
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let computation = compute();
        let task = {
            let inner = self.inner.clone();
            let in_flight = Arc::clone(&self.in_flight);
            let key = key.clone();
            tokio::spawn(async move {
                let outcome = computation.await.map(Arc::new);
                if let Ok(forecast) = &outcome {
                    inner.insert(key.clone(), Arc::clone(forecast)).await;
                }
                retire(&in_flight, &key, generation);
                outcome
            })
        };

        let flight = {
            let in_flight = Arc::clone(&self.in_flight);
            let key = key.clone();
            async move {
                match task.await {
                    Ok(outcome) => outcome.map_err(Arc::new),
                    Err(join_error) => {
                        // The task never reached its own cleanup
                        retire(&in_flight, &key, generation);
                        Err(Arc::new(AppError::CacheComputation(join_error.to_string())))
                    }
                }
            }
            .boxed()
            .shared()
        };

        flights.insert(key.clone(), (generation, flight.clone()));
        flight
    }

    pub async fn get(&self, key: &ForecastKey) -> Option<Arc<ConsensusForecast>> {
        self.inner.get(key).await
    }

    pub async fn invalidate(&self, key: &ForecastKey) {
        self.inner.invalidate(key).await;
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Computations currently running
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

fn lock(table: &FlightTable) -> MutexGuard<'_, HashMap<ForecastKey, (u64, Flight)>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

fn retire(table: &FlightTable, key: &ForecastKey, generation: u64) {
    let mut flights = lock(table);
    if matches!(flights.get(key), Some((g, _)) if *g == generation) {
        flights.remove(key);
    }
}
