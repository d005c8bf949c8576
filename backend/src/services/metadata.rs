//! Field metadata collaborators

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shared::{validate_elevation, validate_urban_density, Coordinate, FieldContext};
use sqlx::{FromRow, PgPool};

use crate::error::AppResult;

/// Static classifiers for a field
#[async_trait]
pub trait FieldMetadataProvider: Send + Sync {
    /// Context for `field_id`. Unknown fields get a plain context.
    async fn field_context(&self, field_id: &str, coordinate: &Coordinate)
        -> AppResult<FieldContext>;
}

/// Build the context from stored classifiers. Stored values outside their
/// valid range are dropped with a warning; the request elevation wins.
fn checked_context(
    field_id: &str,
    coordinate: &Coordinate,
    stored_elevation: Option<f64>,
    near_water: bool,
    urban_density: Option<f64>,
) -> FieldContext {
    let stored_elevation = stored_elevation.filter(|e| match validate_elevation(*e) {
        Ok(()) => true,
        Err(reason) => {
            tracing::warn!(field_id, elevation_m = e, reason, "Ignoring stored field elevation");
            false
        }
    });
    let urban_density = urban_density.filter(|d| match validate_urban_density(*d) {
        Ok(()) => true,
        Err(reason) => {
            tracing::warn!(field_id, urban_density = d, reason, "Ignoring stored urban density");
            false
        }
    });

    FieldContext {
        field_id: field_id.to_string(),
        coordinate: coordinate.with_elevation(coordinate.elevation_m.or(stored_elevation)),
        near_water,
        urban_density,
    }
}

#[derive(Debug, FromRow)]
struct FieldMetadataRow {
    elevation_m: Option<Decimal>,
    near_water: bool,
    urban_density: Option<Decimal>,
}

/// Reads the `field_metadata` table
#[derive(Clone)]
pub struct PgFieldMetadata {
    db: PgPool,
}

impl PgFieldMetadata {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FieldMetadataProvider for PgFieldMetadata {
    async fn field_context(
        &self,
        field_id: &str,
        coordinate: &Coordinate,
    ) -> AppResult<FieldContext> {
        let row = sqlx::query_as::<_, FieldMetadataRow>(
            r#"
            SELECT elevation_m, near_water, urban_density
            FROM field_metadata
            WHERE field_id = $1
            "#,
        )
        .bind(field_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(FieldContext::plain(field_id, *coordinate));
        };

        Ok(checked_context(
            field_id,
            coordinate,
            row.elevation_m.and_then(|e| e.to_f64()),
            row.near_water,
            row.urban_density.and_then(|d| d.to_f64()),
        ))
    }
}

/// Metadata for one field held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldProfile {
    pub elevation_m: Option<f64>,
    pub near_water: bool,
    pub urban_density: Option<f64>,
}

/// In-memory metadata provider
#[derive(Debug, Clone, Default)]
pub struct StaticFieldMetadata {
    fields: HashMap<String, FieldProfile>,
}

impl StaticFieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field_id: impl Into<String>, profile: FieldProfile) -> Self {
        self.fields.insert(field_id.into(), profile);
        self
    }
}

#[async_trait]
impl FieldMetadataProvider for StaticFieldMetadata {
    async fn field_context(
        &self,
        field_id: &str,
        coordinate: &Coordinate,
    ) -> AppResult<FieldContext> {
        let Some(profile) = self.fields.get(field_id) else {
            return Ok(FieldContext::plain(field_id, *coordinate));
        };
        Ok(checked_context(
            field_id,
            coordinate,
            profile.elevation_m,
            profile.near_water,
            profile.urban_density,
        ))
    }
}
