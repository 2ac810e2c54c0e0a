#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report lifecycle state machine.
//!
//! A report is either *active* or *archived*. Three things move it:
//!
//! - **refresh** — a user confirms the noise is still there; the
//!   timestamp resets and the report stays active.
//! - **inactive** — a user rejects the report; it is flagged
//!   `active = false` and moved to the archive under its original key.
//! - **expiry sweep** — a periodic job archiving every active report
//!   older than [`MAX_ACTIVE_HOURS`] or already flagged inactive.
//!
//! The store gives per-document atomicity only, so a refresh racing the
//! sweep on the same document can still land in the archive if the sweep
//! read the pre-refresh timestamp. That drift is accepted; the next sweep
//! or listing resolves it. The sweep itself is idempotent — rerunning it
//! with no new submissions archives nothing.

pub mod proximity;

use chrono::{Duration, Utc};
use quiet_map_query::QueryError;
use quiet_map_repository::{ReportRepository, RepositoryError};
use strum_macros::{AsRefStr, Display, EnumString};

/// Hours an unconfirmed report stays active before the sweep archives it.
pub const MAX_ACTIVE_HOURS: i64 = 24;

/// The two lifecycle transitions a caller can request.
///
/// A closed enum: an unrecognized action token fails to parse at the
/// boundary (`"refresh".parse::<TransitionAction>()`) and never reaches
/// the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum TransitionAction {
    /// Confirm still noisy: reset the expiry clock, stay active.
    Refresh,
    /// No longer noisy: deactivate and move to the archive.
    Inactive,
}

/// Result of a single transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionOutcome {
    /// The action that was applied.
    pub action: TransitionAction,
    /// Whether the report was moved to the archive.
    pub archived: bool,
}

/// Errors from lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// No active report with the given id.
    #[error("No report found with id {id}")]
    NotFound {
        /// The id that matched nothing.
        id: String,
    },

    /// Underlying repository failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Failure reading the active listing during a proximity scan.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Applies a transition to the active report with the given id.
///
/// `Refresh` resets the timestamp to now and rewrites the document in
/// place, restarting its expiry clock. `Inactive` flags the document
/// `active = false`, stamps it, and moves it to the archive
/// (write-then-delete, so a crash in between duplicates rather than
/// loses it).
///
/// # Errors
///
/// Returns [`LifecycleError::NotFound`] for an unknown id,
/// [`LifecycleError::Repository`] on store failures.
pub async fn transition_report(
    repo: &ReportRepository,
    id: &str,
    action: TransitionAction,
) -> Result<TransitionOutcome, LifecycleError> {
    let Some((key, mut report)) = repo.find_active_by_id(id).await? else {
        return Err(LifecycleError::NotFound { id: id.to_string() });
    };

    match action {
        TransitionAction::Refresh => {
            report.active = true;
            report.timestamp = Some(Utc::now());
            repo.update_active(&key, &report).await?;
            log::info!("report {id} refreshed");
            Ok(TransitionOutcome {
                action,
                archived: false,
            })
        }
        TransitionAction::Inactive => {
            report.active = false;
            report.timestamp = Some(Utc::now());
            repo.archive_entry(&key, &report).await?;
            log::info!("report {id} deactivated and archived");
            Ok(TransitionOutcome {
                action,
                archived: true,
            })
        }
    }
}

/// Archives every active report that has expired or is flagged inactive.
///
/// A report is expired when more than [`MAX_ACTIVE_HOURS`] have passed
/// since its timestamp; a missing timestamp counts as expired. The
/// timestamp is left untouched on the way to the archive. The sweep is
/// not transactional across documents — a crash mid-sweep leaves some
/// reports migrated and others untouched, and rerunning is safe.
///
/// # Errors
///
/// Returns [`LifecycleError::Repository`] on store failures.
pub async fn run_expiry_sweep(repo: &ReportRepository) -> Result<u64, LifecycleError> {
    let now = Utc::now();
    let mut archived = 0u64;

    for (key, mut report) in repo.list_active_entries().await? {
        let expired = report
            .timestamp
            .is_none_or(|t| now.signed_duration_since(t) > Duration::hours(MAX_ACTIVE_HOURS));

        if expired || !report.active {
            report.active = false;
            repo.archive_entry(&key, &report).await?;
            archived += 1;
        }
    }

    log::info!("expiry sweep archived {archived} reports");
    Ok(archived)
}
