//! Historical observation stores

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{Coordinate, DailyObservation};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

/// Read access to daily station or reanalysis observations
#[async_trait]
pub trait HistoricalObservationStore: Send + Sync {
    /// Observations near `coordinate` dated within `[start, end]`.
    /// Rows may be unordered or duplicated.
    async fn query(
        &self,
        coordinate: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyObservation>>;
}

/// Postgres-backed store reading `daily_observations`
#[derive(Clone)]
pub struct PgObservationStore {
    db: PgPool,
    tolerance_deg: f64,
}

#[derive(Debug, FromRow)]
struct ObservationRow {
    observed_on: NaiveDate,
    temp_max_c: Decimal,
    temp_min_c: Decimal,
    precipitation_mm: Decimal,
}

impl ObservationRow {
    fn into_observation(self) -> AppResult<DailyObservation> {
        let to_f64 = |d: Decimal| {
            d.to_f64()
                .ok_or_else(|| AppError::ObservationStore(format!("unrepresentable value {}", d)))
        };
        Ok(DailyObservation {
            date: self.observed_on,
            temp_max_c: to_f64(self.temp_max_c)?,
            temp_min_c: to_f64(self.temp_min_c)?,
            precipitation_mm: to_f64(self.precipitation_mm)?,
        })
    }
}

impl PgObservationStore {
    pub fn new(db: PgPool, tolerance_deg: f64) -> Self {
        Self { db, tolerance_deg }
    }
}

#[async_trait]
impl HistoricalObservationStore for PgObservationStore {
    async fn query(
        &self,
        coordinate: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyObservation>> {
        let decimal = |v: f64| {
            Decimal::from_f64(v)
                .ok_or_else(|| AppError::validation("coordinate", "Coordinate is not representable"))
        };
        let latitude = decimal(coordinate.latitude)?;
        let longitude = decimal(coordinate.longitude)?;
        let tolerance = decimal(self.tolerance_deg)?;

        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT observed_on, temp_max_c, temp_min_c, precipitation_mm
            FROM daily_observations
            WHERE latitude BETWEEN $1 - $3 AND $1 + $3
              AND longitude BETWEEN $2 - $3 AND $2 + $3
              AND observed_on BETWEEN $4 AND $5
            ORDER BY observed_on, ABS(latitude - $1) + ABS(longitude - $2)
            "#,
        )
        .bind(latitude)
        .bind(longitude)
        .bind(tolerance)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ObservationRow::into_observation).collect()
    }
}

/// One CSV record; the header names match the database columns
#[derive(Debug, Deserialize)]
struct CsvRecord {
    latitude: f64,
    longitude: f64,
    observed_on: NaiveDate,
    temp_max_c: f64,
    temp_min_c: f64,
    precipitation_mm: f64,
}

/// In-memory store loaded from a CSV export, for offline use
#[derive(Debug, Clone)]
pub struct CsvObservationStore {
    records: Vec<(f64, f64, DailyObservation)>,
    tolerance_deg: f64,
}

impl CsvObservationStore {
    pub fn from_path(path: impl AsRef<Path>, tolerance_deg: f64) -> AppResult<Self> {
        let reader = csv::Reader::from_path(path.as_ref()).map_err(|e| {
            AppError::ObservationStore(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_reader(reader, tolerance_deg)
    }

    pub fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        tolerance_deg: f64,
    ) -> AppResult<Self> {
        let mut records = Vec::new();
        for (line, result) in reader.deserialize::<CsvRecord>().enumerate() {
            let record = result.map_err(|e| {
                AppError::ObservationStore(format!("record {}: {}", line + 1, e))
            })?;
            records.push((
                record.latitude,
                record.longitude,
                DailyObservation {
                    date: record.observed_on,
                    temp_max_c: record.temp_max_c,
                    temp_min_c: record.temp_min_c,
                    precipitation_mm: record.precipitation_mm,
                },
            ));
        }

        tracing::info!(records = records.len(), "Loaded observation CSV");
        Ok(Self {
            records,
            tolerance_deg,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl HistoricalObservationStore for CsvObservationStore {
    async fn query(
        &self,
        coordinate: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyObservation>> {
        Ok(self
            .records
            .iter()
            .filter(|(lat, lon, obs)| {
                (lat - coordinate.latitude).abs() <= self.tolerance_deg
                    && (lon - coordinate.longitude).abs() <= self.tolerance_deg
                    && obs.date >= start
                    && obs.date <= end
            })
            .map(|(_, _, obs)| *obs)
            .collect())
    }
}
