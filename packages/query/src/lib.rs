#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only query service for quiet-map.
//!
//! Lists the active reports as a `GeoJSON` feature collection sorted
//! newest first, and echoes the published zones document. No mutation.

use quiet_map_models::{NoiseReport, ReportFeature, ReportFeatureCollection, ZonesDocument};
use quiet_map_repository::{ReportRepository, RepositoryError};

/// Errors from query operations.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// No zones document has been published yet.
    #[error("No zones document has been published yet")]
    ZonesNotFound,

    /// Underlying repository failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Lists all active reports, newest first.
///
/// Documents that fail to parse are skipped by the repository scan.
/// Documents with non-finite coordinates or decibel levels are dropped
/// here, as is anything whose `active` flag is explicitly `false` — a
/// defense against entries the expiry sweep has not migrated yet. A
/// missing timestamp sorts as epoch 0, i.e. last.
///
/// # Errors
///
/// Returns [`QueryError::Repository`] on store failures.
pub async fn list_active_reports(
    repo: &ReportRepository,
) -> Result<ReportFeatureCollection, QueryError> {
    let mut reports: Vec<NoiseReport> = repo
        .list_active_entries()
        .await?
        .into_iter()
        .map(|(_, report)| report)
        .filter(|report| {
            report.lat.is_finite() && report.lon.is_finite() && report.decibel.is_finite()
        })
        .filter(|report| {
            if report.active {
                true
            } else {
                log::debug!("dropping stale inactive document {} from listing", report.id);
                false
            }
        })
        .collect();

    reports.sort_by_key(|report| std::cmp::Reverse(report.sort_millis()));

    Ok(ReportFeatureCollection::new(
        reports.iter().map(ReportFeature::from_report).collect(),
    ))
}

/// Returns the zones document published by the last aggregation run.
///
/// # Errors
///
/// Returns [`QueryError::ZonesNotFound`] if no aggregation run has
/// published zones yet, [`QueryError::Repository`] on store failures.
pub async fn get_zones(repo: &ReportRepository) -> Result<ZonesDocument, QueryError> {
    repo.get_zones().await?.ok_or(QueryError::ZonesNotFound)
}
