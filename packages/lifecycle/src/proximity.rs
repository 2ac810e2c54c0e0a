//! Proximity detection for the "still noisy here?" confirmation flow.
//!
//! "Nearby" is a Chebyshev-style bounding box, not a true radius: a
//! report matches when both the latitude and longitude differences are
//! strictly below [`NEARBY_TOLERANCE_DEG`]. The UI collaborator shows the
//! matches to the user and fans a single yes/no answer out to every one
//! of them via [`apply_nearby`].

use quiet_map_models::ReportFeature;
use quiet_map_repository::ReportRepository;

use crate::{LifecycleError, TransitionAction, transition_report};

/// Matching tolerance in decimal degrees (≈ 200 m).
pub const NEARBY_TOLERANCE_DEG: f64 = 0.002;

/// Finds every active report within the tolerance box around a location.
///
/// Reads the active listing through the query service, so the same
/// corrupt-document skipping and `active == false` filtering apply. The
/// returned order carries no meaning.
///
/// # Errors
///
/// Returns [`LifecycleError::Query`] on store failures.
pub async fn find_nearby_active(
    repo: &ReportRepository,
    lat: f64,
    lon: f64,
) -> Result<Vec<ReportFeature>, LifecycleError> {
    let listing = quiet_map_query::list_active_reports(repo).await?;

    Ok(listing
        .features
        .into_iter()
        .filter(|feature| {
            let [report_lon, report_lat] = feature.geometry.coordinates;
            (report_lat - lat).abs() < NEARBY_TOLERANCE_DEG
                && (report_lon - lon).abs() < NEARBY_TOLERANCE_DEG
        })
        .collect())
}

/// Applies one action to every active report near a location.
///
/// This is a batch confirmation: a single answer can transition several
/// reports at once, whatever their origin. Matches are processed
/// independently in unspecified order; overlapping clusters are not
/// deduplicated, which is harmless since every match receives the same
/// action. A match that vanishes mid-batch (a concurrent sweep or
/// transition got there first) is skipped.
///
/// Returns how many reports were transitioned.
///
/// # Errors
///
/// Returns [`LifecycleError::Query`] or [`LifecycleError::Repository`] on
/// store failures.
pub async fn apply_nearby(
    repo: &ReportRepository,
    lat: f64,
    lon: f64,
    action: TransitionAction,
) -> Result<u64, LifecycleError> {
    let matches = find_nearby_active(repo, lat, lon).await?;

    let mut transitioned = 0u64;
    for feature in &matches {
        match transition_report(repo, &feature.properties.id, action).await {
            Ok(_) => transitioned += 1,
            Err(LifecycleError::NotFound { id }) => {
                log::debug!("nearby report {id} vanished before its transition, skipping");
            }
            Err(err) => return Err(err),
        }
    }

    log::info!("applied {action} to {transitioned} nearby reports");
    Ok(transitioned)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use quiet_map_models::{NoiseReport, SeverityColor};
    use quiet_map_repository::Namespaces;
    use quiet_map_store::MemoryStore;

    use super::*;

    fn repo() -> ReportRepository {
        ReportRepository::new(Arc::new(MemoryStore::new()), Namespaces::default())
    }

    fn report_at(id: &str, lat: f64, lon: f64) -> NoiseReport {
        NoiseReport {
            id: id.to_string(),
            lat,
            lon,
            decibel: 85.0,
            reason: None,
            color: Some(SeverityColor::Red),
            timestamp: Some(Utc::now()),
            active: true,
        }
    }

    #[tokio::test]
    async fn matches_within_the_box_only() {
        let repo = repo();
        repo.save_active(&report_at("close", 40.8518, 14.2681))
            .await
            .unwrap();
        repo.save_active(&report_at("far", 40.8000, 14.2000))
            .await
            .unwrap();

        let nearby = find_nearby_active(&repo, 40.8519, 14.2682).await.unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].properties.id, "close");
    }

    #[tokio::test]
    async fn box_requires_both_axes_within_tolerance() {
        let repo = repo();
        // Inside on latitude, outside on longitude: no match
        repo.save_active(&report_at("lon_out", 40.8518, 14.2681 + 0.0025))
            .await
            .unwrap();
        // Just inside on both axes
        repo.save_active(&report_at(
            "inside",
            40.8518 + NEARBY_TOLERANCE_DEG * 0.9,
            14.2681 - NEARBY_TOLERANCE_DEG * 0.9,
        ))
        .await
        .unwrap();

        let nearby = find_nearby_active(&repo, 40.8518, 14.2681).await.unwrap();
        let ids: Vec<&str> = nearby.iter().map(|f| f.properties.id.as_str()).collect();
        assert_eq!(ids, vec!["inside"]);
    }

    #[tokio::test]
    async fn ignores_inactive_reports() {
        let repo = repo();
        let mut stale = report_at("stale", 40.8518, 14.2681);
        stale.active = false;
        repo.save_active(&stale).await.unwrap();

        let nearby = find_nearby_active(&repo, 40.8518, 14.2681).await.unwrap();
        assert!(nearby.is_empty());
    }

    #[tokio::test]
    async fn yes_answer_refreshes_every_match() {
        let repo = repo();
        repo.save_active(&report_at("a", 40.8518, 14.2681))
            .await
            .unwrap();
        repo.save_active(&report_at("b", 40.8519, 14.2682))
            .await
            .unwrap();
        repo.save_active(&report_at("far", 40.9000, 14.4000))
            .await
            .unwrap();

        let transitioned = apply_nearby(&repo, 40.8518, 14.2681, TransitionAction::Refresh)
            .await
            .unwrap();
        assert_eq!(transitioned, 2);

        assert!(repo.find_active_by_id("a").await.unwrap().is_some());
        assert!(repo.find_active_by_id("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn no_answer_archives_every_match() {
        let repo = repo();
        repo.save_active(&report_at("a", 40.8518, 14.2681))
            .await
            .unwrap();
        repo.save_active(&report_at("b", 40.8519, 14.2682))
            .await
            .unwrap();

        let transitioned = apply_nearby(&repo, 40.8518, 14.2681, TransitionAction::Inactive)
            .await
            .unwrap();
        assert_eq!(transitioned, 2);

        assert!(repo.find_active_by_id("a").await.unwrap().is_none());
        assert!(repo.find_active_by_id("b").await.unwrap().is_none());
        assert!(repo.find_archived_by_id("a").await.unwrap().is_some());
        assert!(repo.find_archived_by_id("b").await.unwrap().is_some());
    }
}
