//! Concurrent fan-out to every configured weather provider
//!
//! Each provider call runs as its own task with its own timeout, and the
//! whole fan-out is bounded by an overall deadline. Failures are recorded
//! and logged; the call only fails when no provider produced a usable
//! payload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shared::{Coordinate, ForecastWindow, RawProviderSeries};
use tokio::task::{Id, JoinSet};
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::ProvidersConfig;
use crate::error::{AppError, AppResult};
use crate::external::{ProviderError, WeatherProvider};

/// A provider that was dropped from the fan-out
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub source: String,
    pub reason: String,
}

/// Outcome of one fan-out
#[derive(Debug, Clone)]
pub struct AggregationReport {
    /// Usable payloads, in configured provider order
    pub series: Vec<RawProviderSeries>,
    pub failures: Vec<ProviderFailure>,
    pub attempted: usize,
}

impl AggregationReport {
    pub fn sources(&self) -> Vec<String> {
        self.series.iter().map(|s| s.source.clone()).collect()
    }

    pub fn failed_sources(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.source.clone()).collect()
    }
}

/// Fans a forecast request out to all providers
pub struct SourceAggregator {
    providers: Vec<Arc<dyn WeatherProvider>>,
    per_provider_timeout: Duration,
    overall_deadline: Duration,
    min_samples: usize,
    horizon_days: u32,
}

/// Result of one provider task: (source id, elapsed, result)
type TaskOutput = (String, Duration, Result<RawProviderSeries, ProviderError>);

impl SourceAggregator {
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, config: &ProvidersConfig) -> Self {
        Self {
            providers,
            per_provider_timeout: config.per_provider_timeout(),
            overall_deadline: config.overall_deadline(),
            min_samples: config.min_samples,
            horizon_days: config.horizon_days,
        }
    }

    /// Query every provider concurrently for the configured horizon.
    ///
    /// Dropping the returned future aborts all in-flight provider tasks.
    pub async fn aggregate(
        &self,
        coordinate: &Coordinate,
        field_id: &str,
    ) -> AppResult<AggregationReport> {
        let window = ForecastWindow::starting_now(self.horizon_days);
        let deadline = Instant::now() + self.overall_deadline;
        let attempted = self.providers.len();

        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut slots: HashMap<Id, usize> = HashMap::with_capacity(attempted);
        for (index, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let coordinate = *coordinate;
            let per_call = self.per_provider_timeout;
            let handle = tasks.spawn(async move {
                let source = provider.source_id().to_string();
                let started = std::time::Instant::now();
                let result = match timeout(per_call, provider.fetch(&coordinate, &window)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(per_call)),
                };
                (source, started.elapsed(), result)
            });
            slots.insert(handle.id(), index);
        }

        // Slots stay None until the provider reports back
        let mut outcomes: Vec<Option<Result<RawProviderSeries, String>>> = vec![None; attempted];
        let mut deadline_hit = false;

        loop {
            match timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(Ok((id, (source, elapsed, result))))) => {
                    let Some(&index) = slots.get(&id) else {
                        continue;
                    };
                    let outcome = result
                        .and_then(|series| self.validate_payload(series))
                        .map(|mut series| {
                            series.source = source.clone();
                            series
                        });
                    match &outcome {
                        Ok(series) => tracing::debug!(
                            field_id,
                            source = %source,
                            samples = series.samples.len(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Provider responded"
                        ),
                        Err(e) => tracing::warn!(
                            field_id,
                            source = %source,
                            elapsed_ms = elapsed.as_millis() as u64,
                            error = %e,
                            "Provider dropped from fan-out"
                        ),
                    }
                    outcomes[index] = Some(outcome.map_err(|e| e.to_string()));
                }
                Ok(Some(Err(join_error))) => {
                    let Some(&index) = slots.get(&join_error.id()) else {
                        continue;
                    };
                    let reason = ProviderError::TaskFailed(join_error.to_string()).to_string();
                    tracing::warn!(
                        field_id,
                        source = self.providers[index].source_id(),
                        reason = %reason,
                        "Provider dropped from fan-out"
                    );
                    outcomes[index] = Some(Err(reason));
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        field_id,
                        pending = tasks.len(),
                        deadline_ms = self.overall_deadline.as_millis() as u64,
                        "Overall provider deadline reached, proceeding with completed subset"
                    );
                    tasks.abort_all();
                    deadline_hit = true;
                    break;
                }
            }
        }

        let mut series = Vec::new();
        let mut failures = Vec::new();
        for (provider, outcome) in self.providers.iter().zip(outcomes) {
            match outcome {
                Some(Ok(s)) => series.push(s),
                Some(Err(reason)) => failures.push(ProviderFailure {
                    source: provider.source_id().to_string(),
                    reason,
                }),
                None => {
                    let reason = if deadline_hit {
                        ProviderError::Timeout(self.overall_deadline).to_string()
                    } else {
                        ProviderError::TaskFailed("task panicked or was aborted".to_string())
                            .to_string()
                    };
                    tracing::warn!(field_id, source = provider.source_id(), reason = %reason, "Provider dropped from fan-out");
                    failures.push(ProviderFailure {
                        source: provider.source_id().to_string(),
                        reason,
                    });
                }
            }
        }

        if series.is_empty() {
            tracing::error!(field_id, attempted, "All weather providers failed");
            return Err(AppError::ForecastUnavailable { attempted });
        }

        tracing::info!(
            field_id,
            succeeded = series.len(),
            failed = failures.len(),
            "Provider fan-out complete"
        );

        Ok(AggregationReport {
            series,
            failures,
            attempted,
        })
    }

    /// Reject empty, partial or implausible payloads
    fn validate_payload(&self, series: RawProviderSeries) -> Result<RawProviderSeries, ProviderError> {
        if series.samples.is_empty() {
            return Err(ProviderError::EmptyPayload);
        }
        if let Some(bad) = series.samples.iter().find(|s| !s.is_plausible()) {
            return Err(ProviderError::InvalidPayload(format!(
                "implausible sample at {}",
                bad.timestamp
            )));
        }
        if series.samples.len() < self.min_samples {
            return Err(ProviderError::InvalidPayload(format!(
                "partial payload: {} samples, {} required",
                series.samples.len(),
                self.min_samples
            )));
        }
        Ok(series)
    }
}
