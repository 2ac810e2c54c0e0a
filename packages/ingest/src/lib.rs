#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion service: validates and persists newly submitted noise reports.
//!
//! Validation rejects any lat/lon/decibel that is not a finite non-zero
//! number. The non-zero rule deliberately carries over the original
//! submission behavior, which treated 0 as missing — a report at exactly
//! latitude or longitude 0 cannot be submitted. See the boundary test
//! below.

use chrono::Utc;
use quiet_map_models::{NoiseReport, SeverityColor, quantize_coord};
use quiet_map_repository::{ReportRepository, RepositoryError};
use uuid::Uuid;

/// A report submission before validation.
#[derive(Debug, Clone)]
pub struct NewReport {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Measured sound level in dB.
    pub decibel: f64,
    /// Optional free-text annotation.
    pub reason: Option<String>,
}

/// Errors from report submission.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A numeric field was missing, non-finite, or zero. Rejected before
    /// any store write.
    #[error("Invalid {field}: must be a finite non-zero number")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The store write failed after validation passed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Validates a submission and persists it under the active namespace.
///
/// On success the report gets a fresh UUIDv4 id, the current time as its
/// timestamp, a severity color derived from the decibel level, coordinates
/// quantized to 4 decimals, and `active = true`. Returns the full persisted
/// report. The single store write is the only side effect.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] for malformed input (before any
/// write), [`IngestError::Repository`] if the store write fails.
pub async fn submit_report(
    repo: &ReportRepository,
    input: &NewReport,
) -> Result<NoiseReport, IngestError> {
    require_finite_nonzero(input.lat, "lat")?;
    require_finite_nonzero(input.lon, "lon")?;
    require_finite_nonzero(input.decibel, "decibel")?;

    let reason = input
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let report = NoiseReport {
        id: Uuid::new_v4().to_string(),
        lat: quantize_coord(input.lat),
        lon: quantize_coord(input.lon),
        decibel: input.decibel,
        reason,
        color: Some(SeverityColor::for_reading(input.decibel)),
        timestamp: Some(Utc::now()),
        active: true,
    };

    repo.save_active(&report).await?;
    log::info!(
        "saved noise report {} ({} dB, {})",
        report.id,
        report.decibel,
        report.display_color()
    );

    Ok(report)
}

fn require_finite_nonzero(value: f64, field: &'static str) -> Result<(), IngestError> {
    if value.is_finite() && value != 0.0 {
        Ok(())
    } else {
        Err(IngestError::Validation { field })
    }
}
