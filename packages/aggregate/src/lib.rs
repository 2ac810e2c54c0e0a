#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial aggregation engine.
//!
//! A scheduled batch that bins the full archive into ~110 m grid cells
//! (coordinates quantized to 3 decimals), computes per-cell statistics,
//! and publishes one zone feature per non-empty cell. The zones document
//! is rewritten wholesale as the final step of a run — a run that fails
//! partway leaves the previous document authoritative.
//!
//! Cell assignment quantizes by formatting, not by rounding to a grid
//! origin: two points 0.0009° apart that straddle a rounding boundary
//! land in different cells. Accepted approximation.

use std::collections::BTreeMap;

use quiet_map_models::{SeverityColor, ZoneFeature, ZoneProperties, ZonesDocument};
use quiet_map_repository::{ReportRepository, RepositoryError};

/// Floor opacity for the sparsest zone.
const OPACITY_FLOOR: f64 = 0.1;

/// Ceiling opacity for the densest zone.
const OPACITY_CEIL: f64 = 0.9;

/// Errors from an aggregation run.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Underlying repository failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-cell accumulator: running sums and a count.
#[derive(Debug, Default, Clone, Copy)]
struct Cell {
    lat_sum: f64,
    lon_sum: f64,
    db_sum: f64,
    count: u64,
}

/// Cell key for a coordinate pair, quantized by formatting to 3 decimals
/// (~110 m).
fn cell_key(lat: f64, lon: f64) -> String {
    format!("{lat:.3}|{lon:.3}")
}

/// Extracts a finite (lat, lon, decibel) triple from an archived document.
fn finite_point(value: &serde_json::Value) -> Option<(f64, f64, f64)> {
    let lat = value.get("lat")?.as_f64().filter(|v| v.is_finite())?;
    let lon = value.get("lon")?.as_f64().filter(|v| v.is_finite())?;
    let db = value.get("decibel")?.as_f64().filter(|v| v.is_finite())?;
    Some((lat, lon, db))
}

/// Folds archived documents into zone features.
///
/// Pure and order-independent: every valid document contributes to
/// exactly one cell keyed by its quantized coordinates, and cells are
/// emitted in key order, so identical inputs in any order produce an
/// identical document.
#[must_use]
pub fn build_zones(values: &[serde_json::Value]) -> ZonesDocument {
    let mut cells: BTreeMap<String, Cell> = BTreeMap::new();
    let mut total = 0u64;
    let mut skipped = 0u64;

    for value in values {
        let Some((lat, lon, db)) = finite_point(value) else {
            skipped += 1;
            continue;
        };

        let cell = cells.entry(cell_key(lat, lon)).or_default();
        cell.lat_sum += lat;
        cell.lon_sum += lon;
        cell.db_sum += db;
        cell.count += 1;
        total += 1;
    }

    if skipped > 0 {
        log::warn!("aggregation skipped {skipped} archived documents without finite numbers");
    }

    let max_count = cells.values().map(|cell| cell.count).max().unwrap_or(0).max(1);

    let features = cells
        .values()
        .map(|cell| {
            #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
            let count = cell.count as f64;
            let mean_lat = cell.lat_sum / count;
            let mean_lon = cell.lon_sum / count;
            let mean_db = cell.db_sum / count;

            #[allow(clippy::cast_precision_loss)]
            let opacity = OPACITY_FLOOR + (count / max_count as f64) * 0.8;

            #[allow(clippy::cast_possible_truncation)] // decibel means are tiny integers
            let mean_db_display = mean_db.round() as i64;

            ZoneFeature::new(
                mean_lon,
                mean_lat,
                ZoneProperties {
                    count: cell.count,
                    mean_db: mean_db_display,
                    color: SeverityColor::for_zone_mean(mean_db),
                    opacity: opacity.min(OPACITY_CEIL),
                },
            )
        })
        .collect();

    log::info!(
        "aggregated {total} archived reports into {} cells",
        cells.len()
    );
    ZonesDocument::new(features)
}

/// Runs one aggregation pass over the archive and publishes the result.
///
/// Streams every archived document (corrupt ones are skipped by the
/// repository scan, non-numeric ones here), folds them into cells, and
/// replaces the zones document in a single overwrite. Returns the number
/// of zones emitted. Idempotent given identical archive contents.
///
/// # Errors
///
/// Returns [`AggregateError::Repository`] on store failures; on error no
/// zones document is written.
pub async fn run_aggregation(repo: &ReportRepository) -> Result<usize, AggregateError> {
    let values = repo.list_archived_values().await?;
    let zones = build_zones(&values);
    let emitted = zones.features.len();

    repo.put_zones(&zones).await?;
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quiet_map_repository::Namespaces;
    use quiet_map_store::{DocumentStore, MemoryStore};
    use rand::seq::SliceRandom;

    use super::*;

    fn archived(lat: f64, lon: f64, db: f64) -> serde_json::Value {
        serde_json::json!({
            "id": "x",
            "lat": lat,
            "lon": lon,
            "decibel": db,
            "active": false,
        })
    }

    #[test]
    fn bins_one_cell_and_averages() {
        let values = vec![
            archived(40.8518, 14.2681, 80.0),
            archived(40.8516, 14.2683, 70.0),
            archived(40.8517, 14.2682, 60.0),
        ];

        let zones = build_zones(&values);
        assert_eq!(zones.features.len(), 1);

        let zone = &zones.features[0];
        assert_eq!(zone.properties.count, 3);
        assert_eq!(zone.properties.mean_db, 70);
        assert_eq!(zone.properties.color, SeverityColor::Red); // 70 >= zone red threshold
        assert!((zone.geometry.coordinates[1] - 40.8517).abs() < 1e-9);
        assert!((zone.geometry.coordinates[0] - 14.2682).abs() < 1e-9);
    }

    #[test]
    fn opacity_is_bounded_and_maximal_for_the_densest_cell() {
        let mut values = Vec::new();
        for _ in 0..5 {
            values.push(archived(40.851, 14.268, 60.0));
        }
        values.push(archived(40.900, 14.300, 45.0));

        let zones = build_zones(&values);
        assert_eq!(zones.features.len(), 2);

        let max_zone = zones
            .features
            .iter()
            .max_by_key(|z| z.properties.count)
            .unwrap();
        assert!((max_zone.properties.opacity - 0.9).abs() < 1e-9);

        for zone in &zones.features {
            assert!(zone.properties.opacity >= 0.1);
            assert!(zone.properties.opacity <= 0.9);
        }
    }

    #[test]
    fn quantization_boundary_splits_nearby_points() {
        // 0.0009 degrees apart but straddling the 3-decimal rounding
        // boundary: different cells. Accepted approximation.
        let values = vec![
            archived(40.8514, 14.2680, 60.0),
            archived(40.8516, 14.2680, 60.0),
        ];

        let zones = build_zones(&values);
        assert_eq!(zones.features.len(), 2);
    }

    #[test]
    fn skips_documents_without_finite_numbers() {
        let values = vec![
            archived(40.8518, 14.2681, 85.0),
            serde_json::json!({"lat": "not a number", "lon": 14.0, "decibel": 60}),
            serde_json::json!({"lon": 14.0, "decibel": 60}),
        ];

        let zones = build_zones(&values);
        assert_eq!(zones.features.len(), 1);
        assert_eq!(zones.features[0].properties.count, 1);
    }

    #[test]
    fn deterministic_under_input_shuffling() {
        let mut values: Vec<serde_json::Value> = (0..40)
            .map(|i| {
                archived(
                    40.85 + f64::from(i % 7) * 0.0015,
                    14.26 + f64::from(i % 5) * 0.0021,
                    40.0 + f64::from(i),
                )
            })
            .collect();

        let baseline = serde_json::to_string(&build_zones(&values)).unwrap();

        let mut rng = rand::rng();
        for _ in 0..5 {
            values.shuffle(&mut rng);
            let shuffled = serde_json::to_string(&build_zones(&values)).unwrap();
            assert_eq!(shuffled, baseline);
        }
    }

    #[tokio::test]
    async fn run_publishes_zones_from_the_archive() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(
                "quietplace-history",
                "a.json",
                serde_json::to_vec(&archived(40.8518, 14.2681, 85.0))
                    .unwrap()
                    .as_slice(),
                true,
            )
            .await
            .unwrap();
        let repo = ReportRepository::new(store, Namespaces::default());

        let emitted = run_aggregation(&repo).await.unwrap();
        assert_eq!(emitted, 1);

        let zones = repo.get_zones().await.unwrap().unwrap();
        assert_eq!(zones.features.len(), 1);
        assert_eq!(zones.features[0].properties.color, SeverityColor::Red);
        assert!((zones.features[0].properties.opacity - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_archive_publishes_an_empty_collection() {
        let repo = ReportRepository::new(Arc::new(MemoryStore::new()), Namespaces::default());

        assert_eq!(run_aggregation(&repo).await.unwrap(), 0);
        let zones = repo.get_zones().await.unwrap().unwrap();
        assert!(zones.features.is_empty());
    }

    #[tokio::test]
    async fn repeated_runs_replace_rather_than_merge() {
        let store = Arc::new(MemoryStore::new());
        let repo = ReportRepository::new(Arc::clone(&store) as Arc<dyn DocumentStore>, Namespaces::default());

        store
            .put(
                "quietplace-history",
                "a.json",
                serde_json::to_vec(&archived(40.8518, 14.2681, 85.0))
                    .unwrap()
                    .as_slice(),
                true,
            )
            .await
            .unwrap();
        assert_eq!(run_aggregation(&repo).await.unwrap(), 1);

        // Archive emptied between runs: the next run fully replaces
        store.delete("quietplace-history", "a.json").await.unwrap();
        assert_eq!(run_aggregation(&repo).await.unwrap(), 0);
        assert!(repo.get_zones().await.unwrap().unwrap().features.is_empty());
    }

    // Full pass through the report lifecycle: submit two reports, confirm
    // proximity matching, reject the loud one, and aggregate it into a
    // red zone.
    #[tokio::test]
    async fn end_to_end_submission_to_zone() {
        use quiet_map_lifecycle::{TransitionAction, proximity};

        let repo = ReportRepository::new(Arc::new(MemoryStore::new()), Namespaces::default());

        let loud = quiet_map_ingest::submit_report(
            &repo,
            &quiet_map_ingest::NewReport {
                lat: 40.8518,
                lon: 14.2681,
                decibel: 85.0,
                reason: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            loud.color,
            Some(quiet_map_models::SeverityColor::Red)
        );

        let quiet = quiet_map_ingest::submit_report(
            &repo,
            &quiet_map_ingest::NewReport {
                lat: 40.8000,
                lon: 14.2000,
                decibel: 40.0,
                reason: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            quiet.color,
            Some(quiet_map_models::SeverityColor::Green)
        );

        // The loud report was submitted first, so it lists second...
        let listing = quiet_map_query::list_active_reports(&repo).await.unwrap();
        assert_eq!(listing.features.len(), 2);

        // ...but it is the only one inside the 0.002-degree box
        let nearby = proximity::find_nearby_active(&repo, 40.8519, 14.2682)
            .await
            .unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].properties.id, loud.id);

        quiet_map_lifecycle::transition_report(&repo, &loud.id, TransitionAction::Inactive)
            .await
            .unwrap();
        let listing = quiet_map_query::list_active_reports(&repo).await.unwrap();
        assert_eq!(listing.features.len(), 1);
        assert_eq!(listing.features[0].properties.id, quiet.id);

        assert_eq!(run_aggregation(&repo).await.unwrap(), 1);
        let zones = quiet_map_query::get_zones(&repo).await.unwrap();
        let zone = &zones.features[0];
        assert_eq!(zone.properties.count, 1);
        assert_eq!(zone.properties.mean_db, 85);
        assert_eq!(zone.properties.color, SeverityColor::Red);
        assert!((zone.geometry.coordinates[1] - 40.8518).abs() < 0.001);
        assert!((zone.geometry.coordinates[0] - 14.2681).abs() < 0.001);
    }
}
