#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report repository for quiet-map.
//!
//! Maps the domain operations (save, find-by-id, list-active,
//! move-to-archive, zones read/write) onto three document store
//! namespaces: *active*, *archive*, and *zones*. The store provides only
//! per-document atomicity, so the active → archive move is a two-step
//! write-then-delete: on a crash in between, the document exists in both
//! places rather than neither (duplication over loss).
//!
//! Bulk reads are resilient to individual bad records: a document that
//! fails to parse is logged and skipped, never aborts the scan.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use quiet_map_models::{NoiseReport, ZonesDocument};
use quiet_map_store::{DocumentStore, StoreError};

/// Key of the single zones summary document within the zones namespace.
pub const ZONES_KEY: &str = "zones.json";

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Underlying document store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Document (de)serialization failure on a single-document operation.
    #[error("Failed to (de)serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The three store namespaces the repository operates on.
#[derive(Debug, Clone)]
pub struct Namespaces {
    /// Live, unconfirmed-stale reports.
    pub active: String,
    /// Terminal storage for expired/rejected reports.
    pub archive: String,
    /// The published zones summary.
    pub zones: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            active: "quietplace-data".to_string(),
            archive: "quietplace-history".to_string(),
            zones: "quietplace-zones".to_string(),
        }
    }
}

impl Namespaces {
    /// Builds the namespace configuration, honoring the `NOISE_CONTAINER`
    /// override for the active namespace (matching the original
    /// deployment). All other components receive this struct by injection;
    /// nothing in the core reads the environment at call time.
    #[must_use]
    pub fn from_env() -> Self {
        let mut namespaces = Self::default();
        if let Ok(active) = std::env::var("NOISE_CONTAINER")
            && !active.is_empty()
        {
            namespaces.active = active;
        }
        namespaces
    }
}

/// Repository over the active/archive/zones namespaces.
pub struct ReportRepository {
    store: Arc<dyn DocumentStore>,
    namespaces: Namespaces,
}

impl ReportRepository {
    /// Creates a repository over the given store and namespaces.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, namespaces: Namespaces) -> Self {
        Self { store, namespaces }
    }

    /// The namespace configuration in use.
    #[must_use]
    pub const fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Creates all three namespaces if they do not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures.
    pub async fn ensure_namespaces(&self) -> Result<(), RepositoryError> {
        self.store.ensure_namespace(&self.namespaces.active).await?;
        self.store.ensure_namespace(&self.namespaces.archive).await?;
        self.store.ensure_namespace(&self.namespaces.zones).await?;
        Ok(())
    }

    /// Storage key for a report: `{timestamp}_{id}.json`.
    ///
    /// Embedding the timestamp first gives raw keys a natural
    /// chronological ordering; the id suffix keeps them unique.
    #[must_use]
    pub fn storage_key(report: &NoiseReport) -> String {
        let timestamp = report.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        format!(
            "{}_{}.json",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            report.id
        )
    }

    /// Persists a freshly created report under the active namespace.
    ///
    /// The key embeds a fresh UUID, so an existing-key conflict means a
    /// caller bug; the write does not overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the report fails to serialize.
    pub async fn save_active(&self, report: &NoiseReport) -> Result<(), RepositoryError> {
        let key = Self::storage_key(report);
        let bytes = serde_json::to_vec(report)?;
        self.store
            .put(&self.namespaces.active, &key, &bytes, false)
            .await?;
        Ok(())
    }

    /// Overwrites an existing active document in place (refresh path).
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the report fails to serialize.
    pub async fn update_active(
        &self,
        key: &str,
        report: &NoiseReport,
    ) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(report)?;
        self.store
            .put(&self.namespaces.active, key, &bytes, true)
            .await?;
        Ok(())
    }

    /// Lists every parseable document in the active namespace, with its
    /// storage key.
    ///
    /// Corrupt documents are logged and skipped; a key that vanishes
    /// between list and get (a concurrent archive move) is skipped
    /// silently. Order is whatever the store returns — callers must not
    /// depend on it.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] if the listing itself or an
    /// individual read fails.
    pub async fn list_active_entries(
        &self,
    ) -> Result<Vec<(String, NoiseReport)>, RepositoryError> {
        let keys = self.store.list(&self.namespaces.active).await?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bytes) = self.store.get(&self.namespaces.active, &key).await? else {
                log::debug!("active document {key} vanished mid-scan, skipping");
                continue;
            };
            match serde_json::from_slice::<NoiseReport>(&bytes) {
                Ok(report) => entries.push((key, report)),
                Err(err) => log::warn!("skipping corrupt active document {key}: {err}"),
            }
        }

        Ok(entries)
    }

    /// Finds the active document whose key embeds the given report id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the matched document is corrupt.
    pub async fn find_active_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(String, NoiseReport)>, RepositoryError> {
        self.find_by_id(&self.namespaces.active, id).await
    }

    /// Finds the archived document whose key embeds the given report id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the matched document is corrupt.
    pub async fn find_archived_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(String, NoiseReport)>, RepositoryError> {
        self.find_by_id(&self.namespaces.archive, id).await
    }

    async fn find_by_id(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Option<(String, NoiseReport)>, RepositoryError> {
        let keys = self.store.list(namespace).await?;
        let Some(key) = keys.into_iter().find(|key| key.contains(id)) else {
            return Ok(None);
        };

        let Some(bytes) = self.store.get(namespace, &key).await? else {
            // Vanished between list and get — treat as not found
            return Ok(None);
        };

        let report = serde_json::from_slice::<NoiseReport>(&bytes)?;
        Ok(Some((key, report)))
    }

    /// Moves a document from the active namespace to the archive under its
    /// original key.
    ///
    /// Write-then-delete: the archive write must succeed before the active
    /// delete, so a crash in between duplicates the document instead of
    /// losing it. A rerun of the sweep cleans the duplicate up.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the report fails to serialize.
    pub async fn archive_entry(
        &self,
        key: &str,
        report: &NoiseReport,
    ) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(report)?;
        self.store
            .put(&self.namespaces.archive, key, &bytes, true)
            .await?;
        self.store.delete(&self.namespaces.active, key).await?;
        Ok(())
    }

    /// Lenient scan of the archive namespace for aggregation.
    ///
    /// Returns raw JSON values for every `.json` document that parses;
    /// corrupt documents are logged and skipped. The aggregation engine
    /// applies its own finite-number filtering on top.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] if the listing itself or an
    /// individual read fails.
    pub async fn list_archived_values(&self) -> Result<Vec<serde_json::Value>, RepositoryError> {
        let keys = self.store.list(&self.namespaces.archive).await?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            if !key.ends_with(".json") {
                continue;
            }
            let Some(bytes) = self.store.get(&self.namespaces.archive, &key).await? else {
                continue;
            };
            match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Ok(value) => values.push(value),
                Err(err) => log::warn!("skipping corrupt archived document {key}: {err}"),
            }
        }

        Ok(values)
    }

    /// Replaces the zones summary document wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the document fails to serialize.
    pub async fn put_zones(&self, zones: &ZonesDocument) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(zones)?;
        self.store
            .put(&self.namespaces.zones, ZONES_KEY, &bytes, true)
            .await?;
        Ok(())
    }

    /// Reads the current zones summary document, if one has been published.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on store failures,
    /// [`RepositoryError::Serialize`] if the stored document is corrupt.
    pub async fn get_zones(&self) -> Result<Option<ZonesDocument>, RepositoryError> {
        let Some(bytes) = self.store.get(&self.namespaces.zones, ZONES_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
